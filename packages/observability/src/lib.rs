//! # Observability
//!
//! Logging setup shared by every part of the data exchange node.
//!
//! Components never configure logging themselves. The binary calls
//! [`init_with_config`] once at startup and everything else uses the
//! standard `tracing` macros with structured fields:
//!
//! ```rust,ignore
//! observability::init_with_config(observability::LogConfig {
//!     service_name: "data-exchange".into(),
//!     default_level: "debug".into(),
//!     log_path: Some("/data/logs/exchange.jsonl".into()),
//!     ..Default::default()
//! })?;
//!
//! tracing::info!(peer_id = %id, "peer added");
//! ```
//!
//! When `log_path` is set, every event is also appended to that file as a
//! single JSON object per line, with `peerId`, `requestId`, `eventId` and
//! `path` lifted to top-level keys.

mod file;
mod json_layer;

use std::io;
use std::path::PathBuf;

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name of the service, included in every JSONL line.
    pub service_name: String,

    /// Default log level filter (e.g., "debug", "info", "warn").
    /// Can be overridden by `RUST_LOG` environment variable.
    pub default_level: String,

    /// Optional JSONL log file. Parent directories are created.
    pub log_path: Option<PathBuf>,

    /// Emit human-readable logs to stderr.
    pub also_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".into(),
            default_level: "info".into(),
            log_path: None,
            also_stderr: true,
        }
    }
}

/// Initialize the observability layer with custom configuration.
///
/// Returns an error only when the JSONL file cannot be opened. Calling this
/// twice is harmless: the second global subscriber is rejected silently.
pub fn init_with_config(config: LogConfig) -> io::Result<()> {
    match &config.log_path {
        Some(path) => file::init_file_subscriber(&config, path),
        None => {
            use tracing_subscriber::util::SubscriberInitExt;
            let _ = tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                        tracing_subscriber::EnvFilter::new(&config.default_level)
                    }),
                )
                .with_target(true)
                .compact()
                .with_writer(io::stderr)
                .finish()
                .try_init();
            Ok(())
        }
    }
}
