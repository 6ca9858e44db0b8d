//! Application wiring and lifecycle management.

mod init;
mod state;

pub use init::run;
pub use state::AppState;
