use thiserror::Error;

#[derive(Error, Debug)]
pub enum BlobError {
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Blob content missing from storage
    #[error("Blob not found: {0}")]
    NotFound(String),

    /// Sidecar present but unreadable
    #[error("Invalid blob: {0}")]
    InvalidMetadata(String),

    /// Upload body failed before completion
    #[error("Blob body error: {0}")]
    Body(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type BlobResult<T> = Result<T, BlobError>;
