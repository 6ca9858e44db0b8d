//! Node startup.

use super::AppState;
use crate::{api, p2p};
use anyhow::Context;
use exchange_config_and_utils::{Config, Paths};
use peer_identity::TlsContext;
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;

/// Load TLS material and peers, then serve the local API and the peer
/// listener until Ctrl-C.
pub async fn run(config: Config, paths: Paths) -> anyhow::Result<()> {
    info!(data_dir = %paths.base_dir().display(), "Starting data exchange");

    let timeout = Duration::from_secs(config.delivery.timeout_secs);
    let tls = TlsContext::load(paths.clone(), timeout).context("Failed to load TLS materials")?;
    let state = AppState::build(config, paths, Arc::new(tls))
        .context("Failed to load peer registry")?;

    info!(
        peer_id = %state.local_id,
        endpoint = %state.config.p2p_endpoint(),
        destinations = ?state.peers.local_destinations().await,
        "Node identity loaded"
    );

    let api_address = state.config.api.bind_address();
    let api_listener = TcpListener::bind(&api_address)
        .await
        .with_context(|| format!("Failed to bind API listener on {api_address}"))?;
    info!(address = %api_address, "API listener started");

    let p2p_address = state.config.p2p.bind_address();
    let p2p_listener = TcpListener::bind(&p2p_address)
        .await
        .with_context(|| format!("Failed to bind peer listener on {p2p_address}"))?;
    info!(address = %p2p_address, "Peer listener started");

    let api_server = axum::serve(api_listener, api::router(state.clone())).into_future();
    let p2p_server = p2p::serve(p2p_listener, state.clone());

    tokio::select! {
        result = api_server => result.context("API listener failed")?,
        result = p2p_server => result.context("Peer listener failed")?,
        _ = tokio::signal::ctrl_c() => info!("Shutdown signal received"),
    }

    let stats = state.dispatcher.stats().await;
    info!(
        queued = stats.queued,
        in_flight = stats.in_flight,
        pending_messages = state.messages.len(),
        pending_blobs = state.transfers.len(),
        "Data exchange stopped"
    );
    Ok(())
}
