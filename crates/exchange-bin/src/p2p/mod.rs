//! Peer listener: mutually authenticated TLS, one route per peer call.

mod handlers;
mod listener;

pub use listener::serve;

use crate::app::AppState;
use crate::error::RequestError;
use axum::extract::{DefaultBodyLimit, FromRequestParts};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::routing::{head, post, put};
use axum::Router;

/// Identity of the peer on the other end of the connection, taken from
/// its verified client certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerIdentity {
    pub id: String,
}

impl<S: Send + Sync> FromRequestParts<S> for PeerIdentity {
    type Rejection = RequestError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<PeerIdentity>()
            .cloned()
            .ok_or_else(RequestError::unauthorized)
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/ping", head(ping))
        .route("/api/v1/messages", post(handlers::receive_message))
        .route("/api/v1/blobs/{*path}", put(handlers::receive_blob))
        .layer(DefaultBodyLimit::disable())
        .with_state(state)
}

async fn ping() -> StatusCode {
    StatusCode::NO_CONTENT
}
