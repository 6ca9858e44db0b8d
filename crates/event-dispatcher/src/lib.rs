//! Outbound event dispatch to a single external consumer.
//!
//! This crate provides:
//! - OutboundEvent: the closed set of events a node reports to its consumer
//! - EventDispatcher: FIFO dispatch with a bounded in-flight window,
//!   ack-driven progress and producer backpressure
//! - ConsumerFrame: parsing of the acknowledgments a consumer sends back

mod dispatcher;
mod error;
mod events;
mod frames;

#[cfg(test)]
mod tests;

pub use dispatcher::{DispatcherStats, EventDispatcher};
pub use error::{DispatchError, DispatchResult};
pub use events::{
    new_event_id, BlobDelivered, BlobFailed, BlobReceived, Headers, MessageDelivered,
    MessageFailed, MessageReceived, OutboundEvent,
};
pub use frames::ConsumerFrame;
