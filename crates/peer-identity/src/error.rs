//! Identity error types.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IdentityError {
    /// Certificate subject carries neither organization nor unit
    #[error("Invalid peer: certificate has no organization or organizational unit")]
    UnidentifiablePeer,

    #[error("Invalid certificate: {0}")]
    InvalidCertificate(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Sender is not this node
    #[error("Unknown sender: {0}")]
    UnknownSender(String),

    /// Recipient is not a registered peer
    #[error("Unknown recipient: {0}")]
    UnknownRecipient(String),

    #[error("Unknown destination {destination} for {peer_id}")]
    UnknownDestination { peer_id: String, destination: String },

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type IdentityResult<T> = Result<T, IdentityError>;
