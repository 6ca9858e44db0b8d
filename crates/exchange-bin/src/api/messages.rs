//! Outbound message and blob transfer submission.

use super::parse_body;
use crate::app::AppState;
use crate::error::{RequestError, RequestResult};
use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use blob_store::validate_blob_path;
use delivery_queue::{BlobTask, MessageTask};
use event_dispatcher::Headers;
use peer_identity::AddressBook;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub message: Option<String>,
    pub recipient: Option<String>,
    /// Defaults to this node with no destination.
    pub sender: Option<String>,
    #[serde(rename = "requestID", alias = "requestId")]
    pub request_id: Option<String>,
    pub headers: Option<Headers>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendBlobRequest {
    pub path: Option<String>,
    pub recipient: Option<String>,
    pub sender: Option<String>,
    #[serde(rename = "requestID", alias = "requestId")]
    pub request_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Accepted {
    #[serde(rename = "requestID")]
    pub request_id: String,
}

fn request_id(supplied: Option<String>) -> String {
    supplied.unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

pub async fn send_message(
    State(state): State<AppState>,
    body: Bytes,
) -> RequestResult<Json<Accepted>> {
    let request: SendMessageRequest = parse_body(&body)?;
    let message = request
        .message
        .ok_or_else(|| RequestError::bad_request("Missing message"))?;
    let recipient = request
        .recipient
        .ok_or_else(|| RequestError::bad_request("Missing recipient"))?;

    let snapshot = state.peers.snapshot().await;
    let book = AddressBook::new(&state.local_id, &snapshot);
    let sender = book.resolve_sender(request.sender.as_deref().unwrap_or(&*state.local_id))?;
    let (recipient, peer) = book.resolve_recipient(&recipient)?;

    let request_id = request_id(request.request_id);
    info!(request_id = %request_id, recipient = %recipient, "Message accepted");
    state.messages.submit(MessageTask {
        request_id: request_id.clone(),
        sender,
        recipient,
        endpoint: peer.endpoint.clone(),
        message,
        headers: request.headers,
    });

    Ok(Json(Accepted { request_id }))
}

pub async fn send_blob(
    State(state): State<AppState>,
    body: Bytes,
) -> RequestResult<Json<Accepted>> {
    let request: SendBlobRequest = parse_body(&body)?;
    let path = request
        .path
        .ok_or_else(|| RequestError::bad_request("Missing path"))?;
    validate_blob_path(&path)?;
    let recipient = request
        .recipient
        .ok_or_else(|| RequestError::bad_request("Missing recipient"))?;

    let snapshot = state.peers.snapshot().await;
    let book = AddressBook::new(&state.local_id, &snapshot);
    let sender = book.resolve_sender(request.sender.as_deref().unwrap_or(&*state.local_id))?;
    let (recipient, peer) = book.resolve_recipient(&recipient)?;

    let request_id = request_id(request.request_id);
    info!(request_id = %request_id, path = %path, recipient = %recipient, "Blob transfer accepted");
    state
        .transfers
        .submit_stored(BlobTask {
            request_id: request_id.clone(),
            sender,
            recipient,
            endpoint: peer.endpoint.clone(),
            path,
        })
        .await?;

    Ok(Json(Accepted { request_id }))
}
