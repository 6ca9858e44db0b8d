//! Inbound peer calls.
//!
//! The sender is whoever the client certificate says it is. Destinations
//! named in the form are checked against the registry before anything is
//! stored or reported.

use super::PeerIdentity;
use crate::app::AppState;
use crate::error::{RequestError, RequestResult};
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use blob_store::validate_blob_path;
use event_dispatcher::{new_event_id, BlobReceived, Headers, MessageReceived};
use peer_identity::{Address, AddressBook, IdentityError};
use tracing::{debug, info, warn};

/// Subdirectory of the blob store holding blobs sent by peers.
pub const RECEIVED_DIRECTORY: &str = "received";

#[derive(Debug, Default)]
struct InboundForm {
    message: Option<String>,
    headers: Option<Headers>,
    sender_destination: Option<String>,
    recipient_destination: Option<String>,
}

impl InboundForm {
    /// Record a text field. Returns `false` for names this form does not use.
    fn set(&mut self, name: &str, value: String) -> RequestResult<bool> {
        match name {
            "message" => self.message = Some(value),
            "headers" => {
                let headers = serde_json::from_str(&value)
                    .map_err(|_| RequestError::bad_request("Invalid headers"))?;
                self.headers = Some(headers);
            }
            "senderDestination" => self.sender_destination = Some(value),
            "recipientDestination" => self.recipient_destination = Some(value),
            _ => return Ok(false),
        }
        Ok(true)
    }

    async fn resolve(
        &self,
        state: &AppState,
        peer: &PeerIdentity,
    ) -> RequestResult<(Address, Address)> {
        let snapshot = state.peers.snapshot().await;
        let book = AddressBook::new(&state.local_id, &snapshot);
        // A trusted certificate whose peer is not registered is an auth failure.
        let sender = book
            .resolve_remote_sender(&peer.id, self.sender_destination.as_deref())
            .map_err(|e| match e {
                IdentityError::UnknownSender(_) => {
                    warn!(peer_id = %peer.id, "Rejected call from unregistered peer");
                    RequestError::new(StatusCode::UNAUTHORIZED, "Unknown sender")
                }
                other => other.into(),
            })?;
        let recipient = book.resolve_local_recipient(self.recipient_destination.as_deref())?;
        Ok((sender, recipient))
    }
}

pub async fn receive_message(
    State(state): State<AppState>,
    peer: PeerIdentity,
    mut multipart: Multipart,
) -> RequestResult<StatusCode> {
    let mut form = InboundForm::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        let value = field.text().await?;
        if !form.set(&name, value)? {
            debug!(field = %name, "Ignoring unknown form field");
        }
    }

    let (sender, recipient) = form.resolve(&state, &peer).await?;
    let message = form
        .message
        .ok_or_else(|| RequestError::bad_request("Missing message"))?;

    info!(sender = %sender, recipient = %recipient, "Message received");
    state
        .dispatcher
        .enqueue(
            MessageReceived {
                id: new_event_id(),
                sender: sender.to_string(),
                recipient: recipient.to_string(),
                message,
                headers: form.headers,
            }
            .into(),
        )
        .await;
    Ok(StatusCode::NO_CONTENT)
}

/// Destination fields must precede the file part; the blob is streamed to
/// disk as soon as the file part starts.
pub async fn receive_blob(
    State(state): State<AppState>,
    peer: PeerIdentity,
    Path(path): Path<String>,
    mut multipart: Multipart,
) -> RequestResult<StatusCode> {
    let path = format!("/{path}");
    validate_blob_path(&path)?;
    let stored_path = format!("/{RECEIVED_DIRECTORY}/{}{path}", peer.id);

    let mut form = InboundForm::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        if field.file_name().is_none() && name != "blob" {
            let value = field.text().await?;
            if !form.set(&name, value)? {
                debug!(field = %name, "Ignoring unknown form field");
            }
            continue;
        }

        let (sender, recipient) = form.resolve(&state, &peer).await?;
        let metadata = state.blobs.store(&stored_path, Box::pin(field)).await?;

        info!(sender = %sender, path = %stored_path, hash = %metadata.hash, "Blob received");
        state
            .dispatcher
            .enqueue(
                BlobReceived {
                    id: new_event_id(),
                    sender: sender.to_string(),
                    recipient: recipient.to_string(),
                    path: stored_path,
                    hash: metadata.hash,
                    size: metadata.size,
                    last_update: metadata.last_update,
                }
                .into(),
            )
            .await;
        return Ok(StatusCode::NO_CONTENT);
    }
    Err(RequestError::bad_request("Missing blob"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{multipart_request, send, FormPart, TestNode};
    use axum::body::Body;
    use axum::http::{Method, Request};
    use event_dispatcher::OutboundEvent;
    use std::time::Duration;

    async fn node_with_globex() -> TestNode {
        let node = TestNode::start().await;
        node.state
            .peers
            .upsert_peer("globex", Some("https://globex:3001"), Some("billing"))
            .await
            .unwrap();
        node.state.peers.add_local_destination("app").await.unwrap();
        node
    }

    fn from_peer(mut request: Request<Body>, id: &str) -> Request<Body> {
        request.extensions_mut().insert(PeerIdentity { id: id.to_string() });
        request
    }

    async fn next_event(node: &TestNode) -> OutboundEvent {
        let mut events = node.state.dispatcher.subscribe().await;
        node.state.dispatcher.redispatch_in_flight().await;
        tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn test_ping() {
        let node = TestNode::start().await;
        let request = Request::builder()
            .method(Method::HEAD)
            .uri("/api/v1/ping")
            .body(Body::empty())
            .unwrap();

        let (status, _) = send(&node.p2p_router(), request).await;

        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_message_received() {
        let node = node_with_globex().await;
        let request = multipart_request(
            Method::POST,
            "/api/v1/messages",
            &[
                FormPart::text("message", "hello"),
                FormPart::text("headers", r#"{"topic":"orders"}"#),
                FormPart::text("senderDestination", "billing"),
                FormPart::text("recipientDestination", "app"),
            ],
        );

        let (status, _) = send(&node.p2p_router(), from_peer(request, "globex")).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        match next_event(&node).await {
            OutboundEvent::MessageReceived(e) => {
                assert_eq!(e.sender, "globex/billing");
                assert_eq!(e.recipient, "acme-node1/app");
                assert_eq!(e.message, "hello");
                assert_eq!(e.headers.unwrap()["topic"], "orders");
            }
            other => panic!("expected message-received, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_sender_rejected() {
        let node = node_with_globex().await;
        let request = multipart_request(
            Method::POST,
            "/api/v1/messages",
            &[FormPart::text("message", "hello")],
        );

        let (status, body) = send(&node.p2p_router(), from_peer(request, "initech")).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Unknown sender");
        assert_eq!(node.state.dispatcher.stats().await.in_flight, 0);
    }

    #[tokio::test]
    async fn test_undeclared_recipient_destination_rejected() {
        let node = node_with_globex().await;
        let request = multipart_request(
            Method::POST,
            "/api/v1/messages",
            &[
                FormPart::text("message", "hello"),
                FormPart::text("recipientDestination", "shipping"),
            ],
        );

        let (status, _) = send(&node.p2p_router(), from_peer(request, "globex")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_missing_identity_is_unauthorized() {
        let node = node_with_globex().await;
        let request = multipart_request(
            Method::POST,
            "/api/v1/messages",
            &[FormPart::text("message", "hello")],
        );

        let (status, _) = send(&node.p2p_router(), request).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_blob_received_under_sender_directory() {
        let node = node_with_globex().await;
        let request = multipart_request(
            Method::PUT,
            "/api/v1/blobs/docs/a.txt",
            &[
                FormPart::text("recipientDestination", "app"),
                FormPart::file("blob", "a.txt", b"hello"),
            ],
        );

        let (status, _) = send(&node.p2p_router(), from_peer(request, "globex")).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        match next_event(&node).await {
            OutboundEvent::BlobReceived(e) => {
                assert_eq!(e.sender, "globex");
                assert_eq!(e.recipient, "acme-node1/app");
                assert_eq!(e.path, "/received/globex/docs/a.txt");
                assert_eq!(e.size, 5);
            }
            other => panic!("expected blob-received, got {other:?}"),
        }
        assert!(node
            .state
            .blobs
            .exists("/received/globex/docs/a.txt")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_blob_not_stored_for_unknown_destination() {
        let node = node_with_globex().await;
        let request = multipart_request(
            Method::PUT,
            "/api/v1/blobs/docs/a.txt",
            &[
                FormPart::text("senderDestination", "shipping"),
                FormPart::file("blob", "a.txt", b"hello"),
            ],
        );

        let (status, _) = send(&node.p2p_router(), from_peer(request, "globex")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!node
            .state
            .blobs
            .exists("/received/globex/docs/a.txt")
            .await
            .unwrap());
    }
}
