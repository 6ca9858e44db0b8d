//! Peer and destination management.
//!
//! `{id}` equal to this node's id addresses the local destination list
//! instead of the peer registry.

use super::parse_body;
use crate::app::AppState;
use crate::error::{RequestError, RequestResult};
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::Json;
use exchange_config_and_utils::Peer;
use peer_identity::CertSubject;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

#[derive(Debug, Default, Deserialize)]
pub struct PeerUpdate {
    pub endpoint: Option<String>,
    /// PEM certificate to trust for this peer.
    pub cert: Option<String>,
}

pub async fn list_peers(State(state): State<AppState>) -> Json<Vec<Peer>> {
    Json(state.peers.peers().await)
}

pub async fn get_peer(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> RequestResult<Json<Peer>> {
    state
        .peers
        .peer(&id)
        .await
        .map(Json)
        .ok_or_else(|| RequestError::not_found("Peer not found"))
}

pub async fn put_peer(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> RequestResult<Json<Value>> {
    upsert(&state, &id, None, parse_body(&body)?).await
}

pub async fn put_peer_destination(
    State(state): State<AppState>,
    Path((id, destination)): Path<(String, String)>,
    body: Bytes,
) -> RequestResult<Json<Value>> {
    upsert(&state, &id, Some(&destination), parse_body(&body)?).await
}

async fn upsert(
    state: &AppState,
    id: &str,
    destination: Option<&str>,
    update: PeerUpdate,
) -> RequestResult<Json<Value>> {
    if id == &*state.local_id {
        let destination =
            destination.ok_or_else(|| RequestError::bad_request("Missing destination"))?;
        state.peers.add_local_destination(destination).await?;
        return Ok(Json(json!({ "status": "added" })));
    }
    check_peer_id(id)?;

    if let Some(cert) = update.cert.as_deref() {
        CertSubject::from_pem(cert.as_bytes())?;
    }

    state
        .peers
        .upsert_peer(id, update.endpoint.as_deref(), destination)
        .await?;

    if let Some(cert) = update.cert {
        let path = state.paths.peer_cert_file(id);
        tokio::fs::create_dir_all(state.paths.peer_certs_dir()).await?;
        tokio::fs::write(&path, cert).await?;
        let trusted = reload_trust(&state).await?;
        info!(peer_id = %id, trusted_peers = trusted, "Peer certificate stored");
    }

    Ok(Json(json!({ "status": "added" })))
}

pub async fn delete_peer(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> RequestResult<Json<Value>> {
    check_peer_id(&id)?;
    state.peers.remove_peer(&id).await?;

    match tokio::fs::remove_file(state.paths.peer_cert_file(&id)).await {
        Ok(()) => {
            reload_trust(&state).await?;
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    Ok(Json(json!({ "status": "removed" })))
}

pub async fn delete_peer_destination(
    State(state): State<AppState>,
    Path((id, destination)): Path<(String, String)>,
) -> RequestResult<Json<Value>> {
    if id == *state.local_id {
        state.peers.remove_local_destination(&destination).await?;
    } else {
        state.peers.remove_peer_destination(&id, &destination).await?;
    }
    Ok(Json(json!({ "status": "removed" })))
}

/// Re-read `peer-certs/` off the async runtime.
async fn reload_trust(state: &AppState) -> RequestResult<usize> {
    let tls = state.tls.clone();
    let trusted = tokio::task::spawn_blocking(move || tls.reload_peer_certs())
        .await
        .map_err(|e| RequestError::internal(format!("Certificate reload aborted: {e}")))??;
    Ok(trusted)
}

/// Peer ids name files under `peer-certs/`.
fn check_peer_id(id: &str) -> RequestResult<()> {
    let valid = !id.is_empty()
        && !id.starts_with('.')
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(RequestError::bad_request("Invalid peer id"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{get, json_request, send, TestNode, PEER_CERT};
    use axum::http::{Method, StatusCode};

    #[test]
    fn test_check_peer_id() {
        assert!(check_peer_id("globex").is_ok());
        assert!(check_peer_id("acme-node_1.eu").is_ok());
        assert!(check_peer_id("").is_err());
        assert!(check_peer_id("..").is_err());
        assert!(check_peer_id("a b").is_err());
    }

    #[tokio::test]
    async fn test_add_peer_with_certificate() {
        let node = TestNode::start().await;
        let router = node.router();

        let (status, body) = send(
            &router,
            json_request(
                Method::PUT,
                "/api/v1/peers/globex",
                json!({ "endpoint": "https://globex:3001/", "cert": PEER_CERT }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "added" }));

        let stored = std::fs::read_to_string(node.state.paths.peer_cert_file("globex")).unwrap();
        assert_eq!(stored, PEER_CERT);

        let (status, body) = send(&router, get("/api/v1/peers/globex")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["endpoint"], "https://globex:3001");
    }

    #[tokio::test]
    async fn test_new_peer_requires_endpoint() {
        let node = TestNode::start().await;

        let (status, body) = send(
            &node.router(),
            json_request(Method::PUT, "/api/v1/peers/globex", json!({})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing endpoint");
    }

    #[tokio::test]
    async fn test_invalid_certificate_rejected() {
        let node = TestNode::start().await;

        let (status, _) = send(
            &node.router(),
            json_request(
                Method::PUT,
                "/api/v1/peers/globex",
                json!({ "endpoint": "https://globex:3001", "cert": "not a cert" }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(node.state.peers.peer("globex").await.is_none());
    }

    #[tokio::test]
    async fn test_peer_destinations() {
        let node = TestNode::start().await;
        let router = node.router();
        send(
            &router,
            json_request(
                Method::PUT,
                "/api/v1/peers/globex",
                json!({ "endpoint": "https://globex:3001" }),
            ),
        )
        .await;

        let (status, _) = send(
            &router,
            json_request(Method::PUT, "/api/v1/peers/globex/billing", json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(node.state.peers.peer("globex").await.unwrap().has_destination("billing"));

        let (status, body) = send(
            &router,
            json_request(Method::DELETE, "/api/v1/peers/globex/billing", json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "removed" }));

        let (status, body) = send(
            &router,
            json_request(Method::DELETE, "/api/v1/peers/globex/billing", json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Destination not found");
    }

    #[tokio::test]
    async fn test_local_destinations_use_own_id() {
        let node = TestNode::start().await;
        let router = node.router();

        let (status, _) = send(
            &router,
            json_request(Method::PUT, "/api/v1/peers/acme-node1/app", json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(node.state.peers.local_destinations().await, vec!["app"]);

        let (status, _) = send(
            &router,
            json_request(Method::DELETE, "/api/v1/peers/acme-node1/app", json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(node.state.peers.local_destinations().await.is_empty());
    }

    #[tokio::test]
    async fn test_remove_peer_and_certificate() {
        let node = TestNode::start().await;
        let router = node.router();
        send(
            &router,
            json_request(
                Method::PUT,
                "/api/v1/peers/globex",
                json!({ "endpoint": "https://globex:3001", "cert": PEER_CERT }),
            ),
        )
        .await;

        let (status, body) = send(
            &router,
            json_request(Method::DELETE, "/api/v1/peers/globex", json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "removed" }));
        assert!(!node.state.paths.peer_cert_file("globex").exists());

        let (status, body) = send(
            &router,
            json_request(Method::DELETE, "/api/v1/peers/globex", json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Peer not found");
    }
}
