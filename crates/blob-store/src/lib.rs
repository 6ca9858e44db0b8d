//! Content-addressed blob storage.
//!
//! Blobs live under a root directory at their request path. Each stored blob
//! gets a `<blob>.metadata.json` sidecar holding the SHA-256 of the bytes
//! actually written, their count and the time of the write.

mod error;
mod path;
mod store;

pub use error::{BlobError, BlobResult};
pub use path::{validate_blob_path, METADATA_SUFFIX};
pub use store::{BlobMetadata, BlobStore, DeleteOutcome};
