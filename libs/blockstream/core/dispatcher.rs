//! Outbound queue and the paced dispatcher draining it
//!
//! ```text
//! subscribe / unsubscribe / send_raw ──┐
//! supervisor replay ───────────────────┼──> SendQueue (unbounded MPMC) ──> dispatcher ──> socket
//! ```
//!
//! The dispatcher sends at most one message per tick and sleeps
//! `send_interval` after every tick, keeping the client under the server's
//! per-connection message rate.

use crate::core::connection_state::AtomicMetrics;
use crate::traits::error::{Result, StreamError};
use crossbeam_channel::{unbounded, Receiver, Sender};
use futures::{Sink, SinkExt};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::debug;

/// FIFO of built envelopes
///
/// Pushing never blocks and never fails. The queue is unbounded: nothing
/// pushes back on producers when the server is slower than they are.
#[derive(Clone)]
pub struct SendQueue {
    tx: Sender<Value>,
    rx: Receiver<Value>,
}

impl SendQueue {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    pub fn push(&self, message: Value) {
        // The queue holds its own receiver, so the channel cannot be disconnected
        let _ = self.tx.send(message);
    }

    pub fn try_pop(&self) -> Option<Value> {
        self.rx.try_recv().ok()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Drop everything queued, returning how many messages were discarded
    pub fn clear(&self) -> usize {
        self.rx.try_iter().count()
    }
}

impl Default for SendQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Drain `queue` into `sink` until a write fails
///
/// Only returns on error; a failed write is a transport failure.
pub async fn run_dispatcher<S>(
    queue: SendQueue,
    sink: Arc<Mutex<S>>,
    send_interval: Duration,
    metrics: Arc<AtomicMetrics>,
) -> Result<()>
where
    S: Sink<Message, Error = WsError> + Unpin,
{
    loop {
        if let Some(message) = queue.try_pop() {
            let text = serde_json::to_string(&message)?;
            let category_code = message.get("categoryCode").and_then(Value::as_str).unwrap_or("raw");
            let event_code = message.get("eventCode").and_then(Value::as_str).unwrap_or("raw");
            debug!(category_code, event_code, "Dispatching message");

            sink.lock()
                .await
                .send(Message::Text(text))
                .await
                .map_err(|e| StreamError::WebSocket(e.to_string()))?;
            metrics.increment_sent();
        }

        tokio::time::sleep(send_interval).await;
    }
}
