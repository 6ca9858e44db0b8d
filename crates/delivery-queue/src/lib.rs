//! Outbound delivery of messages and blobs to peers.
//!
//! This crate provides:
//! - DeliveryQueue: one transfer at a time per queue, drained by a single
//!   background worker, with submitters returning immediately
//! - with_retry: fixed-delay retry that gives up at once on a remote 404
//! - Transport / HttpTransport: the multipart wire calls to a peer
//!
//! Outcomes are reported as `*-delivered` / `*-failed` events through the
//! event dispatcher; callers only ever see acceptance.

mod error;
mod queue;
mod retry;
mod transport;

pub use error::{DeliveryError, DeliveryResult};
pub use queue::{
    BlobDelivery, BlobQueue, BlobTask, Delivery, DeliveryQueue, MessageDelivery, MessageQueue,
    MessageTask,
};
pub use retry::{with_retry, RetryPolicy};
pub use transport::{ClientSource, HttpTransport, Transport};
