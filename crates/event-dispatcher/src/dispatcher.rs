//! Outbound event dispatcher.
//!
//! Events move from `queued` to `in_flight` in enqueue order, at most
//! `max_inflight` at a time, and leave `in_flight` only when the consumer
//! acknowledges them. When `queued` reaches `max_queue_size` a gate closes
//! and producers wait in [`EventDispatcher::enqueue`] until it drains below
//! the bound again.

use crate::OutboundEvent;
use std::collections::VecDeque;
use std::time::Instant;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, error, info, warn};

/// Queue depth and window occupancy at one point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatcherStats {
    pub queued: usize,
    pub in_flight: usize,
}

struct DispatchState {
    queued: VecDeque<OutboundEvent>,
    in_flight: Vec<OutboundEvent>,
    /// Present while the queue is full. Flipped to `true` on release.
    gate: Option<watch::Sender<bool>>,
    sink: Option<mpsc::UnboundedSender<OutboundEvent>>,
}

impl DispatchState {
    /// Hand an event to the consumer. Losing the consumer does not change
    /// the window; the event stays in flight for the next one.
    fn emit(&mut self, event: OutboundEvent) {
        let event_id = event.id().to_string();
        let delivered = self
            .sink
            .as_ref()
            .is_some_and(|sink| sink.send(event).is_ok());
        if !delivered && self.sink.take().is_some() {
            info!(event_id = %event_id, "Consumer disconnected, holding event in flight");
        }
    }
}

pub struct EventDispatcher {
    max_inflight: usize,
    max_queue_size: usize,
    state: Mutex<DispatchState>,
}

impl EventDispatcher {
    /// Both limits are raised to at least one.
    pub fn new(max_inflight: usize, max_queue_size: usize) -> Self {
        Self {
            max_inflight: max_inflight.max(1),
            max_queue_size: max_queue_size.max(1),
            state: Mutex::new(DispatchState {
                queued: VecDeque::new(),
                in_flight: Vec::new(),
                gate: None,
                sink: None,
            }),
        }
    }

    /// Attach a consumer, replacing any previous one.
    ///
    /// Nothing already in flight is sent to the new consumer until
    /// [`redispatch_in_flight`](Self::redispatch_in_flight) is called.
    pub async fn subscribe(&self) -> mpsc::UnboundedReceiver<OutboundEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state.lock().await;
        if state.sink.replace(tx).is_some() {
            debug!("Replaced event consumer");
        }
        info!(in_flight = state.in_flight.len(), "Event consumer attached");
        rx
    }

    /// Accept an event, waiting first while the queue is full.
    pub async fn enqueue(&self, event: OutboundEvent) {
        let mut blocked_since: Option<Instant> = None;

        let mut state = loop {
            let state = self.state.lock().await;
            let mut open = match state.gate.as_ref().map(watch::Sender::subscribe) {
                Some(open) => open,
                None => break state,
            };
            if blocked_since.is_none() {
                warn!(
                    event_id = %event.id(),
                    queued = state.queued.len(),
                    "Delaying event due to full event queue"
                );
                blocked_since = Some(Instant::now());
            }
            drop(state);
            // A dropped sender also means the gate is gone.
            let _ = open.wait_for(|open| *open).await;
        };

        if let Some(since) = blocked_since {
            info!(
                event_id = %event.id(),
                blocked_ms = since.elapsed().as_millis() as u64,
                "Unblocked event"
            );
        }

        state.queued.push_back(event);
        if state.queued.len() >= self.max_queue_size && state.gate.is_none() {
            warn!(queued = state.queued.len(), "Event queue became full");
            let (gate, _) = watch::channel(false);
            state.gate = Some(gate);
        }

        self.dispatch_next(&mut state);
    }

    fn dispatch_next(&self, state: &mut DispatchState) {
        if state.in_flight.len() < self.max_inflight {
            if let Some(event) = state.queued.pop_front() {
                debug!(event_id = %event.id(), kind = event.kind(), "Dispatched event");
                state.in_flight.push(event.clone());
                state.emit(event);
            }
        }

        if state.queued.len() < self.max_queue_size {
            if let Some(gate) = state.gate.take() {
                gate.send_replace(true);
                info!(queued = state.queued.len(), "Event queue unblocked");
            }
        }
    }

    /// Acknowledge an in-flight event.
    ///
    /// Without an id the oldest in-flight event is acknowledged. Returns
    /// `false` when nothing matched, which leaves all state untouched.
    pub async fn ack(&self, id: Option<&str>) -> bool {
        let mut state = self.state.lock().await;

        if state.in_flight.is_empty() {
            error!(event_id = ?id, "Ack received while no events in flight");
            return false;
        }

        let id = match id {
            Some(id) => id.to_string(),
            None => {
                warn!("Ack without an event id, acknowledging the oldest in-flight event");
                state.in_flight[0].id().to_string()
            }
        };

        let Some(position) = state.in_flight.iter().position(|e| e.id() == id) else {
            warn!(event_id = %id, "Ack received for event that is not in flight");
            return false;
        };
        state.in_flight.remove(position);
        debug!(event_id = %id, "Acknowledged event");

        self.dispatch_next(&mut state);
        true
    }

    /// Send every in-flight event to the consumer again, oldest first.
    /// The window and queue are not touched.
    pub async fn redispatch_in_flight(&self) -> usize {
        let mut state = self.state.lock().await;
        let events = state.in_flight.clone();
        let count = events.len();
        for event in events {
            state.emit(event);
        }
        if count > 0 {
            info!(count, "Re-dispatched in-flight events");
        }
        count
    }

    pub async fn stats(&self) -> DispatcherStats {
        let state = self.state.lock().await;
        DispatcherStats {
            queued: state.queued.len(),
            in_flight: state.in_flight.len(),
        }
    }
}
