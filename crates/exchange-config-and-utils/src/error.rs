//! Core error types for configuration and peer persistence.

use thiserror::Error;

/// Core error type for configuration and peer registry operations.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A new peer was registered without an endpoint
    #[error("Missing endpoint")]
    MissingEndpoint,

    /// Peer not present in the registry
    #[error("Peer not found: {0}")]
    PeerNotFound(String),

    /// Destination not declared for the peer
    #[error("Destination not found: {0}")]
    DestinationNotFound(String),
}

/// Result type alias using CoreError.
pub type CoreResult<T> = Result<T, CoreError>;
