//! Data directory layout.

use crate::CoreResult;
use std::path::PathBuf;

/// Data directory used when neither `--data-dir` nor `DATA_DIRECTORY` is set.
const DEFAULT_DATA_DIRECTORY: &str = "/data";
const PEER_CERTS_SUBDIRECTORY: &str = "peer-certs";
const BLOBS_SUBDIRECTORY: &str = "blobs";

/// Manages file system paths under the node's data directory.
#[derive(Debug, Clone)]
pub struct Paths {
    base_dir: PathBuf,
}

impl Paths {
    /// Resolve the data directory from `DATA_DIRECTORY`, falling back to `/data`.
    pub fn new() -> Self {
        let base_dir = std::env::var("DATA_DIRECTORY")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_DATA_DIRECTORY));
        Self { base_dir }
    }

    /// Create a new Paths instance with a custom base directory.
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// `config.json`
    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// `peers/data.json`
    pub fn peers_file(&self) -> PathBuf {
        self.base_dir.join("peers").join("data.json")
    }

    /// Local certificate presented on both listeners and outbound calls.
    pub fn cert_file(&self) -> PathBuf {
        self.base_dir.join("cert.pem")
    }

    pub fn key_file(&self) -> PathBuf {
        self.base_dir.join("key.pem")
    }

    pub fn peer_certs_dir(&self) -> PathBuf {
        self.base_dir.join(PEER_CERTS_SUBDIRECTORY)
    }

    pub fn peer_cert_file(&self, peer_id: &str) -> PathBuf {
        self.peer_certs_dir().join(format!("{peer_id}.pem"))
    }

    /// Root of the blob store.
    pub fn blobs_dir(&self) -> PathBuf {
        self.base_dir.join(BLOBS_SUBDIRECTORY)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }

    /// JSONL log file (`logs/exchange.jsonl`).
    pub fn log_file(&self) -> PathBuf {
        self.logs_dir().join("exchange.jsonl")
    }

    /// Ensure all required directories exist.
    pub fn ensure_dirs(&self) -> CoreResult<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        std::fs::create_dir_all(self.peer_certs_dir())?;
        std::fs::create_dir_all(self.blobs_dir())?;
        std::fs::create_dir_all(self.logs_dir())?;
        Ok(())
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}
