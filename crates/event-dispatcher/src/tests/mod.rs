//! Scenario tests for the event dispatcher.
//!
//! - `harness.rs`      - event builders and a consumer that records what it receives
//! - `windowing.rs`    - FIFO dispatch and the in-flight bound
//! - `backpressure.rs` - producers blocked by a full queue
//! - `acks.rs`         - acknowledgment matching and no-op acks
//! - `redispatch.rs`   - re-sending the window to a reconnecting consumer

mod redispatch;
