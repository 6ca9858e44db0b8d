//! Peer registry persisted to `peers/data.json`.
//!
//! Peers and local destinations change only through the explicit add/remove
//! operations below. Each change is applied to a copy, written to disk, and
//! only then swapped in, so a failed write leaves the registry as it was.
//! Local destinations live in `config.json`.

use crate::{Config, CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// A remote exchange node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Peer {
    pub id: String,
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destinations: Option<Vec<String>>,
}

impl Peer {
    pub fn new(id: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            endpoint: trim_endpoint(endpoint.into()),
            destinations: None,
        }
    }

    pub fn has_destination(&self, destination: &str) -> bool {
        self.destinations
            .as_ref()
            .is_some_and(|d| d.iter().any(|x| x == destination))
    }
}

/// Point-in-time copy of the registry used for address validation.
#[derive(Debug, Clone, Default)]
pub struct PeerSnapshot {
    pub peers: Vec<Peer>,
    pub local_destinations: Vec<String>,
}

impl PeerSnapshot {
    pub fn peer(&self, id: &str) -> Option<&Peer> {
        self.peers.iter().find(|p| p.id == id)
    }
}

struct RegistryState {
    config: Config,
    peers: Vec<Peer>,
}

/// In-memory owner of the peer list and local destinations.
pub struct PeerRegistry {
    paths: Paths,
    state: RwLock<RegistryState>,
}

fn trim_endpoint(endpoint: String) -> String {
    endpoint.trim_end_matches('/').to_string()
}

fn read_peers_file(path: &Path) -> CoreResult<Vec<Peer>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(path)?;
    let peers: Vec<Peer> = serde_json::from_str(&content)?;
    Ok(peers)
}

impl PeerRegistry {
    /// Load peers from disk, migrating any legacy `peers` array found in
    /// the configuration into `peers/data.json`.
    pub fn load(paths: Paths, mut config: Config) -> CoreResult<Self> {
        let mut peers = read_peers_file(&paths.peers_file())?;

        let legacy = std::mem::take(&mut config.peers);
        let migrated = !legacy.is_empty();
        for peer in legacy {
            if !peers.iter().any(|p| p.id == peer.id) {
                peers.push(peer);
            }
        }

        for peer in &mut peers {
            peer.endpoint = trim_endpoint(std::mem::take(&mut peer.endpoint));
        }

        let registry = Self {
            paths,
            state: RwLock::new(RegistryState { config, peers }),
        };

        if migrated {
            let state = registry.state.try_read().map_err(|_| {
                CoreError::Config("peer registry locked during load".to_string())
            })?;
            write_peers_sync(&registry.paths, &state.peers)?;
            state.config.save(&registry.paths)?;
            info!(count = state.peers.len(), "Migrated peers out of config.json");
        }

        Ok(registry)
    }

    pub async fn peers(&self) -> Vec<Peer> {
        self.state.read().await.peers.clone()
    }

    pub async fn peer(&self, id: &str) -> Option<Peer> {
        self.state
            .read()
            .await
            .peers
            .iter()
            .find(|p| p.id == id)
            .cloned()
    }

    pub async fn local_destinations(&self) -> Vec<String> {
        self.state.read().await.config.destinations.clone()
    }

    pub async fn snapshot(&self) -> PeerSnapshot {
        let state = self.state.read().await;
        PeerSnapshot {
            peers: state.peers.clone(),
            local_destinations: state.config.destinations.clone(),
        }
    }

    /// Add a peer, or update an existing one, optionally declaring a
    /// destination behind it. `endpoint` is required for a new peer.
    pub async fn upsert_peer(
        &self,
        id: &str,
        endpoint: Option<&str>,
        destination: Option<&str>,
    ) -> CoreResult<Peer> {
        let mut state = self.state.write().await;
        let mut peers = state.peers.clone();

        let index = match peers.iter().position(|p| p.id == id) {
            Some(index) => {
                if let Some(endpoint) = endpoint {
                    peers[index].endpoint = trim_endpoint(endpoint.to_string());
                }
                index
            }
            None => {
                let endpoint = endpoint.ok_or(CoreError::MissingEndpoint)?;
                peers.push(Peer::new(id, endpoint));
                peers.len() - 1
            }
        };

        if let Some(destination) = destination {
            let destinations = peers[index].destinations.get_or_insert_with(Vec::new);
            if !destinations.iter().any(|d| d == destination) {
                destinations.push(destination.to_string());
            }
        }

        write_peers(&self.paths, &peers).await?;
        let peer = peers[index].clone();
        state.peers = peers;
        info!(peer_id = %id, destination = ?destination, "Peer added");
        Ok(peer)
    }

    /// Remove a peer entirely. Returns `PeerNotFound` when unknown.
    pub async fn remove_peer(&self, id: &str) -> CoreResult<Peer> {
        let mut state = self.state.write().await;
        let mut peers = state.peers.clone();
        let index = peers
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| CoreError::PeerNotFound(id.to_string()))?;
        let removed = peers.remove(index);
        write_peers(&self.paths, &peers).await?;
        state.peers = peers;
        info!(peer_id = %id, "Peer removed");
        Ok(removed)
    }

    /// Remove one destination from a peer, keeping the peer.
    pub async fn remove_peer_destination(&self, id: &str, destination: &str) -> CoreResult<()> {
        let mut state = self.state.write().await;
        let mut peers = state.peers.clone();
        let peer = peers
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| CoreError::PeerNotFound(id.to_string()))?;
        if !peer.has_destination(destination) {
            return Err(CoreError::DestinationNotFound(destination.to_string()));
        }
        if let Some(destinations) = peer.destinations.as_mut() {
            destinations.retain(|d| d != destination);
        }
        write_peers(&self.paths, &peers).await?;
        state.peers = peers;
        info!(peer_id = %id, destination = %destination, "Peer destination removed");
        Ok(())
    }

    pub async fn add_local_destination(&self, destination: &str) -> CoreResult<()> {
        let mut state = self.state.write().await;
        if state.config.destinations.iter().any(|d| d == destination) {
            debug!(destination = %destination, "Local destination already declared");
            return Ok(());
        }
        let mut config = state.config.clone();
        config.destinations.push(destination.to_string());
        write_config(&self.paths, &config).await?;
        state.config = config;
        info!(destination = %destination, "Local destination added");
        Ok(())
    }

    pub async fn remove_local_destination(&self, destination: &str) -> CoreResult<()> {
        let mut state = self.state.write().await;
        if !state.config.destinations.iter().any(|d| d == destination) {
            return Err(CoreError::DestinationNotFound(destination.to_string()));
        }
        let mut config = state.config.clone();
        config.destinations.retain(|d| d != destination);
        write_config(&self.paths, &config).await?;
        state.config = config;
        info!(destination = %destination, "Local destination removed");
        Ok(())
    }
}

fn write_peers_sync(paths: &Paths, peers: &[Peer]) -> CoreResult<()> {
    let path = paths.peers_file();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(peers)?)?;
    Ok(())
}

async fn write_peers(paths: &Paths, peers: &[Peer]) -> CoreResult<()> {
    let path = paths.peers_file();
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&path, serde_json::to_string_pretty(peers)?).await?;
    debug!(path = %path.display(), count = peers.len(), "Persisted peers");
    Ok(())
}

async fn write_config(paths: &Paths, config: &Config) -> CoreResult<()> {
    tokio::fs::create_dir_all(paths.base_dir()).await?;
    tokio::fs::write(paths.config_file(), serde_json::to_string_pretty(config)?).await?;
    Ok(())
}
