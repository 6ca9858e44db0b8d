//! Delivery error types.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeliveryError {
    /// Remote answered 404. Never retried.
    #[error("Request failed with status code 404: {url}")]
    NotFound { url: String },

    #[error("Request failed with status code {status}")]
    Status { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Local blob missing at submit time
    #[error("Blob not found: {0}")]
    BlobNotFound(String),

    #[error("Blob store error: {0}")]
    Blob(#[from] blob_store::BlobError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DeliveryError {
    /// Errors that another attempt cannot fix.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::BlobNotFound(_)
                | Self::Blob(blob_store::BlobError::NotFound(_))
                | Self::Blob(blob_store::BlobError::InvalidPath(_))
                | Self::Json(_)
        )
    }

    /// HTTP status returned by the peer, if it answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::NotFound { .. } => Some(404),
            Self::Status { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

pub type DeliveryResult<T> = Result<T, DeliveryError>;
