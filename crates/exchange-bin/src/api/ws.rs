//! WebSocket delegate.
//!
//! One connection at a time receives events and sends acknowledgments.
//! Later connections queue up and are promoted, oldest first, when the
//! delegate goes away. A promoted delegate first receives every event
//! still in flight.

use crate::app::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use event_dispatcher::ConsumerFrame;
use futures::stream::SplitStream;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::collections::VecDeque;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

#[derive(Default)]
struct DelegateState {
    next_id: u64,
    active: Option<u64>,
    waiting: VecDeque<(u64, oneshot::Sender<()>)>,
}

/// Tracks which connection is the delegate and who is next in line.
#[derive(Default)]
pub struct DelegateRegistry {
    state: Mutex<DelegateState>,
}

/// A connection's place in the registry.
pub struct Membership {
    pub id: u64,
    /// `None` when the connection became the delegate immediately.
    pub promotion: Option<oneshot::Receiver<()>>,
}

impl DelegateRegistry {
    pub fn join(&self) -> Membership {
        let mut state = self.state.lock();
        let id = state.next_id;
        state.next_id += 1;

        if state.active.is_none() {
            state.active = Some(id);
            return Membership {
                id,
                promotion: None,
            };
        }
        let (tx, rx) = oneshot::channel();
        state.waiting.push_back((id, tx));
        Membership {
            id,
            promotion: Some(rx),
        }
    }

    /// Remove a connection, promoting the next live waiter if it was the
    /// delegate.
    pub fn leave(&self, id: u64) {
        let mut state = self.state.lock();
        if state.active != Some(id) {
            state.waiting.retain(|(waiting, _)| *waiting != id);
            return;
        }
        state.active = None;
        while let Some((next, promote)) = state.waiting.pop_front() {
            if promote.send(()).is_ok() {
                state.active = Some(next);
                break;
            }
        }
    }

    pub fn active(&self) -> Option<u64> {
        self.state.lock().active
    }

    pub fn waiting(&self) -> usize {
        self.state.lock().waiting.len()
    }
}

pub async fn connect(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| serve_connection(state, socket))
}

async fn serve_connection(state: AppState, socket: WebSocket) {
    let membership = state.delegates.join();
    let id = membership.id;
    let (mut sink, mut stream) = socket.split();

    if let Some(promotion) = membership.promotion {
        info!(
            connection = id,
            delegate = ?state.delegates.active(),
            waiting = state.delegates.waiting(),
            "WebSocket connected, waiting to become delegate"
        );
        tokio::select! {
            promoted = promotion => {
                if promoted.is_err() {
                    return;
                }
            }
            _ = wait_for_close(&mut stream) => {
                state.delegates.leave(id);
                debug!(connection = id, "Waiting WebSocket closed");
                return;
            }
        }
    }

    info!(connection = id, "WebSocket delegate assigned");
    let mut events = state.dispatcher.subscribe().await;
    state.dispatcher.redispatch_in_flight().await;

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                let text = match serde_json::to_string(&event) {
                    Ok(text) => text,
                    Err(e) => {
                        error!(event_id = %event.id(), error = %e, "Failed to serialize event");
                        continue;
                    }
                };
                if sink.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => handle_frame(&state, text.as_str()).await,
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            }
        }
    }

    state.delegates.leave(id);
    info!(connection = id, "WebSocket delegate disconnected");
}

async fn handle_frame(state: &AppState, text: &str) {
    match ConsumerFrame::parse(text) {
        Ok(frame) => {
            state.dispatcher.ack(frame.ack_id()).await;
        }
        Err(e) => warn!(error = %e, "Ignoring WebSocket frame"),
    }
}

/// Drain frames from a waiting connection until it closes.
async fn wait_for_close(stream: &mut SplitStream<WebSocket>) {
    while let Some(Ok(message)) = stream.next().await {
        if matches!(message, Message::Close(_)) {
            break;
        }
    }
}
