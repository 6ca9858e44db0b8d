//! Serialized delivery queues.
//!
//! Each queue owns a FIFO of tasks and a `sending` flag. The submitter that
//! finds the flag clear sets it and spawns the single drain loop, which
//! pops and delivers until the queue is empty and then clears the flag.
//! A delivery that panics is logged and skipped; the loop keeps draining.

use crate::{with_retry, DeliveryError, DeliveryResult, RetryPolicy, Transport};
use async_trait::async_trait;
use blob_store::BlobStore;
use event_dispatcher::{
    new_event_id, BlobDelivered, BlobFailed, EventDispatcher, Headers, MessageDelivered,
    MessageFailed, OutboundEvent,
};
use futures::FutureExt;
use parking_lot::Mutex;
use peer_identity::Address;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// A message accepted for delivery to one peer.
#[derive(Debug, Clone)]
pub struct MessageTask {
    pub request_id: String,
    pub sender: Address,
    pub recipient: Address,
    /// Recipient's endpoint, without trailing slash.
    pub endpoint: String,
    pub message: String,
    pub headers: Option<Headers>,
}

/// A stored blob accepted for transfer to one peer.
#[derive(Debug, Clone)]
pub struct BlobTask {
    pub request_id: String,
    pub sender: Address,
    pub recipient: Address,
    pub endpoint: String,
    pub path: String,
}

/// Performs one task end to end and reports the outcome.
#[async_trait]
pub trait Delivery: Send + Sync + 'static {
    type Task: Send + 'static;

    async fn deliver(&self, task: Self::Task);
}

struct QueueState<T> {
    tasks: VecDeque<T>,
    sending: bool,
}

struct QueueInner<D: Delivery> {
    name: &'static str,
    worker: D,
    state: Mutex<QueueState<D::Task>>,
}

impl<D: Delivery> QueueInner<D> {
    async fn drain(&self) {
        loop {
            let task = {
                let mut state = self.state.lock();
                match state.tasks.pop_front() {
                    Some(task) => task,
                    None => {
                        state.sending = false;
                        debug!(queue = self.name, "Delivery queue drained");
                        return;
                    }
                }
            };
            if AssertUnwindSafe(self.worker.deliver(task))
                .catch_unwind()
                .await
                .is_err()
            {
                error!(queue = self.name, "Delivery panicked, task dropped");
            }
        }
    }
}

pub struct DeliveryQueue<D: Delivery> {
    inner: Arc<QueueInner<D>>,
}

impl<D: Delivery> Clone for DeliveryQueue<D> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<D: Delivery> DeliveryQueue<D> {
    pub fn new(name: &'static str, worker: D) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                name,
                worker,
                state: Mutex::new(QueueState {
                    tasks: VecDeque::new(),
                    sending: false,
                }),
            }),
        }
    }

    /// Accept a task. Returns immediately; delivery happens in the
    /// background, one task at a time, in submission order.
    pub fn submit(&self, task: D::Task) {
        let start_drain = {
            let mut state = self.inner.state.lock();
            state.tasks.push_back(task);
            !std::mem::replace(&mut state.sending, true)
        };

        if start_drain {
            let inner = self.inner.clone();
            tokio::spawn(async move { inner.drain().await });
        }
    }

    /// Tasks waiting behind the one being delivered.
    pub fn len(&self) -> usize {
        self.inner.state.lock().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_sending(&self) -> bool {
        self.inner.state.lock().sending
    }

    pub fn worker(&self) -> &D {
        &self.inner.worker
    }
}

pub struct MessageDelivery {
    transport: Arc<dyn Transport>,
    dispatcher: Arc<EventDispatcher>,
    retry: RetryPolicy,
}

impl MessageDelivery {
    pub fn new(
        transport: Arc<dyn Transport>,
        dispatcher: Arc<EventDispatcher>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            dispatcher,
            retry,
        }
    }
}

#[async_trait]
impl Delivery for MessageDelivery {
    type Task = MessageTask;

    async fn deliver(&self, task: MessageTask) {
        let label = format!("POST {}/api/v1/messages", task.endpoint);
        let (transport, pending) = (&self.transport, &task);
        let result = with_retry(&self.retry, &label, |_| async move {
            transport.send_message(pending).await
        })
        .await;

        let event: OutboundEvent = match result {
            Ok(()) => {
                info!(request_id = %task.request_id, recipient = %task.recipient, "Message delivered");
                MessageDelivered {
                    id: new_event_id(),
                    sender: task.sender.to_string(),
                    recipient: task.recipient.to_string(),
                    message: task.message,
                    request_id: Some(task.request_id),
                    headers: task.headers,
                }
                .into()
            }
            Err(e) => {
                warn!(request_id = %task.request_id, recipient = %task.recipient, error = %e, "Failed to deliver message");
                MessageFailed {
                    id: new_event_id(),
                    sender: task.sender.to_string(),
                    recipient: task.recipient.to_string(),
                    message: task.message,
                    request_id: Some(task.request_id),
                    headers: task.headers,
                    error: e.to_string(),
                }
                .into()
            }
        };
        self.dispatcher.enqueue(event).await;
    }
}

pub struct BlobDelivery {
    transport: Arc<dyn Transport>,
    dispatcher: Arc<EventDispatcher>,
    store: Arc<BlobStore>,
    retry: RetryPolicy,
}

impl BlobDelivery {
    pub fn new(
        transport: Arc<dyn Transport>,
        dispatcher: Arc<EventDispatcher>,
        store: Arc<BlobStore>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            dispatcher,
            store,
            retry,
        }
    }
}

#[async_trait]
impl Delivery for BlobDelivery {
    type Task = BlobTask;

    async fn deliver(&self, task: BlobTask) {
        let label = format!("PUT {}/api/v1/blobs{}", task.endpoint, task.path);
        // Re-open per attempt so every retry streams from the start.
        let (store, transport, pending) = (&self.store, &self.transport, &task);
        let result = with_retry(&self.retry, &label, |_| async move {
            let file = store.open(&pending.path).await?;
            transport.send_blob(pending, file).await
        })
        .await;

        let event: OutboundEvent = match result {
            Ok(()) => {
                info!(request_id = %task.request_id, path = %task.path, recipient = %task.recipient, "Blob delivered");
                BlobDelivered {
                    id: new_event_id(),
                    sender: task.sender.to_string(),
                    recipient: task.recipient.to_string(),
                    path: task.path,
                    request_id: Some(task.request_id),
                }
                .into()
            }
            Err(e) => {
                warn!(request_id = %task.request_id, path = %task.path, error = %e, "Failed to deliver blob");
                BlobFailed {
                    id: new_event_id(),
                    sender: task.sender.to_string(),
                    recipient: task.recipient.to_string(),
                    path: task.path,
                    request_id: Some(task.request_id),
                    error: e.to_string(),
                }
                .into()
            }
        };
        self.dispatcher.enqueue(event).await;
    }
}

pub type MessageQueue = DeliveryQueue<MessageDelivery>;
pub type BlobQueue = DeliveryQueue<BlobDelivery>;

impl DeliveryQueue<BlobDelivery> {
    /// Submit a transfer after confirming the blob exists. A missing blob
    /// is reported to the caller and never queued.
    pub async fn submit_stored(&self, task: BlobTask) -> DeliveryResult<()> {
        if !self.worker().store.exists(&task.path).await? {
            return Err(DeliveryError::BlobNotFound(task.path));
        }
        self.submit(task);
        Ok(())
    }
}
