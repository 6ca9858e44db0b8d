//! Local API: plain HTTP, used by the application this node serves.

mod auth;
mod blobs;
mod messages;
mod node;
mod peers;
mod ws;

pub use ws::DelegateRegistry;

use crate::app::AppState;
use crate::error::{RequestError, RequestResult};
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post, put};
use axum::Router;
use serde::de::DeserializeOwned;

/// Header carrying the API key on every local request.
pub const API_KEY_HEADER: &str = "x-api-key";

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/id", get(node::get_id))
        .route("/api/v1/status", get(node::get_status))
        .route("/api/v1/peers", get(peers::list_peers))
        .route(
            "/api/v1/peers/{id}",
            get(peers::get_peer)
                .put(peers::put_peer)
                .delete(peers::delete_peer),
        )
        .route(
            "/api/v1/peers/{id}/{destination}",
            put(peers::put_peer_destination).delete(peers::delete_peer_destination),
        )
        .route("/api/v1/messages", post(messages::send_message))
        .route("/api/v1/transfers", post(messages::send_blob))
        .route(
            "/api/v1/blobs/{*path}",
            get(blobs::get_blob)
                .head(blobs::head_blob)
                .put(blobs::put_blob)
                .delete(blobs::delete_blob),
        )
        .route("/ws", get(ws::connect))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_api_key,
        ))
        .layer(DefaultBodyLimit::disable())
        .with_state(state)
}

/// Parse a JSON request body. An empty body reads as `{}` so missing
/// fields are reported by name.
fn parse_body<T: DeserializeOwned>(body: &[u8]) -> RequestResult<T> {
    let body = if body.is_empty() { b"{}".as_slice() } else { body };
    serde_json::from_slice(body).map_err(|e| RequestError::bad_request(format!("Invalid body: {e}")))
}

/// Wildcard captures arrive without their leading slash.
fn blob_path(captured: &str) -> String {
    format!("/{captured}")
}
