//! Node configuration (`config.json`).

use crate::{CoreResult, Paths, Peer};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_API_PORT: u16 = 3000;
pub const DEFAULT_P2P_PORT: u16 = 3001;
/// Events handed to the consumer but not yet acknowledged.
pub const DEFAULT_MAX_INFLIGHT: usize = 100;
/// Queued events at which producers start waiting.
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 1000;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 500;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Address a listener binds to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListenerConfig {
    pub hostname: String,
    pub port: u16,
    /// Public URL advertised to peers (p2p listener only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

impl ListenerConfig {
    fn with_port(port: u16) -> Self {
        Self {
            hostname: "0.0.0.0".to_string(),
            port,
            endpoint: None,
        }
    }

    /// `hostname:port`, suitable for `TcpListener::bind`.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.hostname, self.port)
    }
}

fn default_api_listener() -> ListenerConfig {
    ListenerConfig::with_port(DEFAULT_API_PORT)
}

fn default_p2p_listener() -> ListenerConfig {
    ListenerConfig::with_port(DEFAULT_P2P_PORT)
}

/// Outbound event window sizing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsConfig {
    #[serde(default = "default_max_inflight")]
    pub max_inflight: usize,
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,
}

fn default_max_inflight() -> usize {
    DEFAULT_MAX_INFLIGHT
}

fn default_queue_size() -> usize {
    DEFAULT_MAX_QUEUE_SIZE
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            max_inflight: DEFAULT_MAX_INFLIGHT,
            queue_size: DEFAULT_MAX_QUEUE_SIZE,
        }
    }
}

/// Retry policy for outbound transfers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_retry_delay_ms() -> u64 {
    DEFAULT_RETRY_DELAY_MS
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

/// Main node configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Local API listener (plain HTTP, API-key protected).
    #[serde(default = "default_api_listener")]
    pub api: ListenerConfig,
    /// Peer listener (mutual TLS).
    #[serde(default = "default_p2p_listener")]
    pub p2p: ListenerConfig,
    /// Required in `x-api-key` on every local API request when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Destinations served behind this node.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub destinations: Vec<String>,
    #[serde(default)]
    pub events: EventsConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    /// Peers from configuration files that predate `peers/data.json`.
    /// Moved into the peer registry on first load.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub peers: Vec<Peer>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            api: default_api_listener(),
            p2p: default_p2p_listener(),
            api_key: None,
            destinations: Vec::new(),
            events: EventsConfig::default(),
            delivery: DeliveryConfig::default(),
            peers: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from the data directory, falling back to defaults
    /// when no file exists. Environment variables override file values.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();

        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the data directory.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        std::fs::create_dir_all(paths.base_dir())?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    fn load_from_env(&mut self) {
        if let Ok(log_level) = std::env::var("LOG_LEVEL") {
            self.log_level = log_level;
        }
    }

    /// URL peers use to reach this node.
    pub fn p2p_endpoint(&self) -> String {
        self.p2p
            .endpoint
            .clone()
            .unwrap_or_else(|| format!("https://{}:{}", self.p2p.hostname, self.p2p.port))
    }
}
