//! HTTP error envelope shared by both listeners.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use blob_store::BlobError;
use delivery_queue::DeliveryError;
use exchange_config_and_utils::CoreError;
use peer_identity::IdentityError;
use serde_json::json;
use tracing::error;

/// A failed request, rendered as `{"error": "<message>"}`.
#[derive(Debug)]
pub struct RequestError {
    pub status: StatusCode,
    pub message: String,
}

pub type RequestResult<T> = Result<T, RequestError>;

impl RequestError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Unauthorized")
    }

    pub fn internal(message: impl Into<String>) -> Self {
        let message = message.into();
        error!(error = %message, "Request failed");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<BlobError> for RequestError {
    fn from(e: BlobError) -> Self {
        match e {
            BlobError::InvalidPath(_) => Self::bad_request("Invalid path"),
            BlobError::NotFound(_) => Self::not_found("Blob not found"),
            BlobError::Body(message) => Self::bad_request(message),
            BlobError::InvalidMetadata(_) => Self::internal("Invalid blob"),
            BlobError::Io(e) => Self::internal(e.to_string()),
        }
    }
}

impl From<IdentityError> for RequestError {
    fn from(e: IdentityError) -> Self {
        match e {
            IdentityError::UnknownRecipient(_) => Self::bad_request("Unknown recipient"),
            IdentityError::UnknownSender(_) => Self::bad_request("Unknown sender"),
            IdentityError::UnknownDestination { .. }
            | IdentityError::InvalidAddress(_)
            | IdentityError::InvalidCertificate(_) => Self::bad_request(e.to_string()),
            IdentityError::UnidentifiablePeer => {
                Self::new(StatusCode::UNAUTHORIZED, e.to_string())
            }
            IdentityError::Tls(_) | IdentityError::Io(_) => Self::internal(e.to_string()),
        }
    }
}

impl From<CoreError> for RequestError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::PeerNotFound(_) => Self::not_found("Peer not found"),
            CoreError::DestinationNotFound(_) => Self::not_found("Destination not found"),
            CoreError::MissingEndpoint => Self::bad_request("Missing endpoint"),
            CoreError::Config(_) | CoreError::Io(_) | CoreError::Json(_) => {
                Self::internal(e.to_string())
            }
        }
    }
}

impl From<DeliveryError> for RequestError {
    fn from(e: DeliveryError) -> Self {
        match e {
            DeliveryError::BlobNotFound(_) => Self::not_found("Blob not found"),
            DeliveryError::Blob(e) => e.into(),
            other => Self::internal(other.to_string()),
        }
    }
}

impl From<axum::extract::multipart::MultipartError> for RequestError {
    fn from(e: axum::extract::multipart::MultipartError) -> Self {
        Self::new(e.status(), e.body_text())
    }
}

impl From<std::io::Error> for RequestError {
    fn from(e: std::io::Error) -> Self {
        Self::internal(e.to_string())
    }
}
