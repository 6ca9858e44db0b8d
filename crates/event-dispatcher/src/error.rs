//! Dispatcher error types.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DispatchError {
    /// Consumer frame was not valid JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Consumer frame parsed but is not an acknowledgment
    #[error("Unsupported consumer frame: {0}")]
    UnsupportedFrame(String),
}

pub type DispatchResult<T> = Result<T, DispatchError>;
