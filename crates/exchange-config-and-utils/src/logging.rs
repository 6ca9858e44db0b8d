//! Logging initialization for the node.
//!
//! Thin wrapper over the observability crate so the binary has one call to
//! make. Logs go to stderr and, when a path is given, to a JSONL file.

use crate::CoreResult;
use std::path::Path;

/// Service name written into every JSONL line.
const SERVICE_NAME: &str = "data-exchange";

/// Initialize the logging system.
///
/// # Arguments
///
/// * `level` - Default log level (trace, debug, info, warn, error);
///   `RUST_LOG` takes precedence when set
/// * `log_path` - Optional JSONL file to append structured entries to
///
/// # Example
///
/// ```ignore
/// init_logging("info", Some(&paths.log_file()))?;
/// tracing::info!("node started");
/// ```
pub fn init_logging(level: &str, log_path: Option<&Path>) -> CoreResult<()> {
    observability::init_with_config(observability::LogConfig {
        service_name: SERVICE_NAME.into(),
        default_level: level.into(),
        log_path: log_path.map(Path::to_path_buf),
        also_stderr: true,
    })?;
    Ok(())
}
