//! Receive loop and event routing
//!
//! Every inbound frame goes through [`EventRouter::handle_text`], one at a
//! time and in arrival order:
//!
//! 1. parse; a frame without `status` invalidates the session
//! 2. classify `status`/`reason`; server errors end the session
//! 3. drop frames without an event and server echoes
//! 4. look the event up in the registry and call the handler

use crate::core::connection_state::{AtomicMetrics, AtomicSessionState};
use crate::core::dispatcher::SendQueue;
use crate::core::pong_tracker::PongTracker;
use crate::core::registry::{SharedHandler, SubscriptionRegistry};
use crate::protocol::classifier::check_status;
use crate::protocol::event::{flatten_event, is_server_echo, routing_key, subscription_kind, SubscriptionKind};
use crate::protocol::payload::{OutboundMessage, PayloadBuilder};
use crate::traits::error::{Result, StreamError};
use futures::{Stream, StreamExt};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, error};

/// Capability handed to address handlers to stop watching their address
///
/// The registry entry is removed before [`unsubscribe`](Self::unsubscribe)
/// returns, so no later event for the address is delivered. While the
/// session is active the server is told through an `accountAddress/unwatch`
/// message on the send queue; otherwise the next replay simply leaves the
/// address out.
#[derive(Clone)]
pub struct Unsubscribe {
    /// Registry key of the subscription
    address: String,
    /// Handler the capability was issued to, so a later re-subscribe survives
    handler: SharedHandler,
    registry: SubscriptionRegistry,
    queue: SendQueue,
    builder: Arc<PayloadBuilder>,
    state: Arc<AtomicSessionState>,
}

impl Unsubscribe {
    pub(crate) fn new(
        address: impl Into<String>,
        handler: SharedHandler,
        router: &EventRouter,
    ) -> Self {
        Self {
            address: address.into(),
            handler,
            registry: router.registry.clone(),
            queue: router.queue.clone(),
            builder: Arc::clone(&router.builder),
            state: Arc::clone(&router.state),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Remove the subscription and queue the unwatch message
    ///
    /// # Returns
    /// `Ok(())` also when the subscription was already removed or replaced;
    /// nothing is sent in that case.
    pub fn unsubscribe(&self) -> Result<()> {
        if self.registry.remove_if_handler(&self.address, &self.handler).is_none() {
            debug!(key = %self.address, "Subscription already gone, nothing to unwatch");
            return Ok(());
        }

        if self.state.is_active() {
            let message = self.builder.build(&OutboundMessage::Unwatch {
                address: self.address.clone(),
            })?;
            self.queue.push(message);
        }
        debug!(key = %self.address, "Unsubscribed address");
        Ok(())
    }
}

impl fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unsubscribe").field("address", &self.address).finish()
    }
}

/// What happened to an inbound frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routed {
    /// A handler ran
    Delivered(SubscriptionKind),
    /// Acknowledgement without an event
    NoEvent,
    /// Echo of a message this client sent
    Echo,
    /// Event of a category no subscription kind covers
    Unroutable,
    /// No registry entry for the event's key
    NoSubscription,
}

#[derive(Clone)]
pub struct EventRouter {
    registry: SubscriptionRegistry,
    queue: SendQueue,
    builder: Arc<PayloadBuilder>,
    state: Arc<AtomicSessionState>,
    metrics: Arc<AtomicMetrics>,
}

impl EventRouter {
    pub fn new(
        registry: SubscriptionRegistry,
        queue: SendQueue,
        builder: Arc<PayloadBuilder>,
        state: Arc<AtomicSessionState>,
        metrics: Arc<AtomicMetrics>,
    ) -> Self {
        Self {
            registry,
            queue,
            builder,
            state,
            metrics,
        }
    }

    /// Process one text frame
    pub fn handle_text(&self, text: &str) -> Result<Routed> {
        let message = match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(message)) => message,
            Ok(_) => return Err(StreamError::InvalidSession("frame is not a JSON object".into())),
            Err(e) => return Err(StreamError::InvalidSession(format!("frame is not JSON: {}", e))),
        };

        if !message.contains_key("status") {
            error!("Inbound message has no status, invalidating session");
            return Err(StreamError::InvalidSession("message has no status".into()));
        }

        if let Err(server_error) = check_status(&message) {
            error!(reason = server_error.reason(), "Server reported an error");
            return Err(server_error.into());
        }

        self.route(&message)
    }

    /// Route a message that already passed the status check
    pub fn route(&self, message: &Map<String, Value>) -> Result<Routed> {
        let event = match message.get("event") {
            Some(Value::Object(event)) => event,
            _ => return Ok(Routed::NoEvent),
        };

        let event_code = event.get("eventCode").and_then(Value::as_str).unwrap_or_default();
        if is_server_echo(event_code) {
            self.metrics.increment_dropped();
            debug!(event_code, "Dropping server echo");
            return Ok(Routed::Echo);
        }

        let Some(kind) = subscription_kind(event) else {
            self.metrics.increment_dropped();
            debug!(event_code, "Dropping event with no subscription kind");
            return Ok(Routed::Unroutable);
        };

        let Some(key) = routing_key(event, kind) else {
            self.metrics.increment_dropped();
            debug!(event_code, "Dropping event without a routing key");
            return Ok(Routed::NoSubscription);
        };

        // Clone the entry so no registry lock is held while the handler runs
        let Some(subscription) = self.registry.get(key) else {
            self.metrics.increment_dropped();
            debug!(event_code, key, "Dropping event for unknown subscription");
            return Ok(Routed::NoSubscription);
        };

        let handler = subscription.handler();
        let unsubscribe = match kind {
            SubscriptionKind::Address => Some(Unsubscribe::new(key, Arc::clone(&handler), self)),
            SubscriptionKind::Transaction => None,
        };

        let result = handler.lock().handle(flatten_event(event), unsubscribe);
        result.map_err(|e| StreamError::Handler(e.to_string()))?;

        self.metrics.increment_delivered();
        Ok(Routed::Delivered(kind))
    }
}

/// Read frames until the socket fails or a frame ends the session
///
/// Only returns on error. Pongs are reported to `tracker`; pings are
/// answered by the websocket layer.
pub async fn run_receive_loop<St>(mut stream: St, router: EventRouter, tracker: Arc<PongTracker>) -> Result<()>
where
    St: Stream<Item = std::result::Result<Message, WsError>> + Unpin,
{
    while let Some(frame) = stream.next().await {
        match frame.map_err(|e| StreamError::WebSocket(e.to_string()))? {
            Message::Text(text) => {
                router.handle_text(&text)?;
            }
            Message::Pong(_) => tracker.record_pong_received(),
            Message::Close(frame) => {
                let reason = frame
                    .map(|f| format!("{} {}", f.code, f.reason))
                    .unwrap_or_else(|| "no close frame".to_string());
                return Err(StreamError::ConnectionClosed(reason));
            }
            Message::Ping(_) | Message::Binary(_) | Message::Frame(_) => {}
        }
    }

    Err(StreamError::ConnectionClosed("stream ended".into()))
}
