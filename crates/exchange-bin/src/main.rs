//! Data exchange node - peer-to-peer message and blob transfer sidecar.

mod api;
mod app;
mod error;
mod p2p;
#[cfg(test)]
mod test_support;

use std::path::PathBuf;

use clap::Parser;
use exchange_config_and_utils::{init_logging, Config, Paths};

/// Data exchange command-line interface.
#[derive(Parser)]
#[command(name = "data-exchange")]
#[command(about = "Peer-to-peer data exchange for messages and blobs")]
#[command(version)]
struct Cli {
    /// Log level (trace, debug, info, warn, error). Overrides the config file.
    #[arg(short, long, env = "LOG_LEVEL")]
    log_level: Option<String>,

    /// Directory holding config.json, certificates, peers and blobs.
    #[arg(long, env = "DATA_DIRECTORY", default_value = "/data")]
    data_dir: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let paths = Paths::with_base_dir(cli.data_dir);
    paths.ensure_dirs()?;
    let mut config = Config::load(&paths)?;
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }

    init_logging(&config.log_level, Some(&paths.log_file()))?;

    app::run(config, paths).await
}
