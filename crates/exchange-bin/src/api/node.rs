//! Node identity and status.

use crate::app::AppState;
use axum::extract::State;
use axum::Json;
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Serialize)]
pub struct NodeIdentity {
    pub id: String,
    pub endpoint: String,
    pub cert: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub destinations: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct PeerStatus {
    pub id: String,
    pub endpoint: String,
    pub available: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeStatus {
    pub message_queue_size: usize,
    pub in_flight_count: usize,
    pub peers: Vec<PeerStatus>,
}

pub async fn get_id(State(state): State<AppState>) -> Json<NodeIdentity> {
    Json(NodeIdentity {
        id: state.local_id.to_string(),
        endpoint: state.config.p2p_endpoint(),
        cert: state.tls.cert_pem().to_string(),
        destinations: state.peers.local_destinations().await,
    })
}

/// Dispatcher depth plus a single ping to every peer, run concurrently.
pub async fn get_status(State(state): State<AppState>) -> Json<NodeStatus> {
    let client = state.tls.client();
    let pings = state.peers.peers().await.into_iter().map(|peer| {
        let client = client.clone();
        async move {
            let url = format!("{}/api/v1/ping", peer.endpoint);
            let available = match client.head(&url).send().await {
                Ok(response) => response.status().is_success(),
                Err(e) => {
                    debug!(peer_id = %peer.id, error = %e, "Peer ping failed");
                    false
                }
            };
            PeerStatus {
                id: peer.id,
                endpoint: peer.endpoint,
                available,
            }
        }
    });
    let peers = futures::future::join_all(pings).await;

    let stats = state.dispatcher.stats().await;
    Json(NodeStatus {
        message_queue_size: stats.queued,
        in_flight_count: stats.in_flight,
        peers,
    })
}
