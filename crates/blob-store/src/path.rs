//! Blob path allow-list.
//!
//! Paths arrive from both the local API and remote peers, so nothing
//! reaches the filesystem until it passes [`validate_blob_path`].

use crate::{BlobError, BlobResult};

pub const METADATA_SUFFIX: &str = ".metadata.json";

/// Accepts `(/[a-z0-9+\-_.]+)+` without any `..`.
///
/// Segments may not start with `.` (which also rules out `.` itself and the
/// store's `.partial` files) and may not end in [`METADATA_SUFFIX`], so a
/// blob can never alias a sidecar or a file outside its own directory.
pub fn validate_blob_path(path: &str) -> BlobResult<()> {
    if path.contains("..") {
        return Err(BlobError::InvalidPath(path.to_string()));
    }
    let Some(rest) = path.strip_prefix('/') else {
        return Err(BlobError::InvalidPath(path.to_string()));
    };
    let valid = rest.split('/').all(|segment| {
        !segment.is_empty()
            && !segment.starts_with('.')
            && !segment.ends_with(METADATA_SUFFIX)
            && segment.bytes().all(is_allowed)
    });
    if !valid {
        return Err(BlobError::InvalidPath(path.to_string()));
    }
    Ok(())
}

fn is_allowed(byte: u8) -> bool {
    matches!(byte, b'a'..=b'z' | b'0'..=b'9' | b'+' | b'-' | b'_' | b'.')
}
