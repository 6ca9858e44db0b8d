//! Configuration, data directory layout and peer persistence for the
//! data exchange node.

mod config;
mod error;
mod logging;
mod paths;
mod peers;

pub use config::{
    Config, DeliveryConfig, EventsConfig, ListenerConfig, DEFAULT_API_PORT, DEFAULT_LOG_LEVEL,
    DEFAULT_MAX_INFLIGHT, DEFAULT_MAX_QUEUE_SIZE, DEFAULT_P2P_PORT,
};
pub use error::{CoreError, CoreResult};
pub use logging::init_logging;
pub use paths::Paths;
pub use peers::{Peer, PeerRegistry, PeerSnapshot};
