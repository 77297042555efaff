use crate::core::builder::{states::NoApiKey, StreamClientBuilder};
use crate::core::config::StreamConfig;
use crate::core::connection_state::{AtomicMetrics, AtomicSessionState, SessionState};
use crate::core::dispatcher::{run_dispatcher, SendQueue};
use crate::core::heartbeat::run_heartbeat;
use crate::core::pong_tracker::PongTracker;
use crate::core::registry::{replay_messages, Subscription, SubscriptionRegistry};
use crate::core::router::{run_receive_loop, EventRouter};
use crate::protocol::payload::{Abi, OutboundMessage, PayloadBuilder, TxStatus};
use crate::traits::*;
use crossbeam_channel::{unbounded, Receiver, Sender};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

/// Upper bound on the close handshake while draining a session
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Connection lifecycle notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Session is active and the replay has been queued
    Connected,
    /// Session ended
    Disconnected,
    /// Opening a new session (attempt number, starting at 1)
    Reconnecting(usize),
    /// A session or handshake failed
    Error(String),
}

/// Client metrics snapshot
#[derive(Debug, Clone)]
pub struct Metrics {
    pub messages_sent: u64,
    pub events_delivered: u64,
    pub events_dropped: u64,
    pub reconnect_count: u64,
    pub subscriptions: usize,
    pub queued_messages: usize,
    /// Time since the heartbeat last pinged, `None` before the first ping of a session
    pub since_last_ping: Option<Duration>,
    pub since_last_pong: Option<Duration>,
    /// `false` while a ping has gone unanswered for longer than the ping timeout
    pub heartbeat_healthy: bool,
    pub session_state: SessionState,
}

struct ClientInner {
    config: StreamConfig,
    payloads: Arc<PayloadBuilder>,
    registry: SubscriptionRegistry,
    queue: SendQueue,
    state: Arc<AtomicSessionState>,
    metrics: Arc<AtomicMetrics>,
    pong_tracker: Arc<PongTracker>,
    shutdown_tx: watch::Sender<bool>,
    event_tx: Sender<ClientEvent>,
    event_rx: Receiver<ClientEvent>,
}

/// Client for the transaction/address event stream
///
/// Cheap to clone; clones share the registry, the send queue and the
/// session. Subscriptions can be registered before or after `connect`:
/// they are sent immediately while a session is active and replayed at the
/// start of every session.
///
/// ```ignore
/// let client = StreamClient::builder().api_key(api_key).build()?;
///
/// client.subscribe_address(address, handler_fn(|txn, _| {
///     println!("{}", txn["hash"]);
///     Ok(())
/// }), None, None)?;
///
/// client.connect(None).await?;
/// ```
#[derive(Clone)]
pub struct StreamClient {
    inner: Arc<ClientInner>,
}

/// How a session ended
enum SessionEnd {
    Shutdown,
    Failed(StreamError),
}

impl StreamClient {
    pub fn builder() -> StreamClientBuilder<NoApiKey> {
        StreamClientBuilder::new()
    }

    pub(crate) fn new(config: StreamConfig, payloads: PayloadBuilder) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        let (event_tx, event_rx) = unbounded();

        Self {
            inner: Arc::new(ClientInner {
                config,
                payloads: Arc::new(payloads),
                registry: SubscriptionRegistry::new(),
                queue: SendQueue::new(),
                state: Arc::new(AtomicSessionState::default()),
                metrics: Arc::new(AtomicMetrics::new()),
                pong_tracker: Arc::new(PongTracker::new()),
                shutdown_tx,
                event_tx,
                event_rx,
            }),
        }
    }

    pub fn config(&self) -> &StreamConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.inner.registry
    }

    #[inline]
    pub fn state(&self) -> SessionState {
        self.inner.state.get()
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.inner.state.is_active()
    }

    pub fn metrics(&self) -> Metrics {
        let inner = &self.inner;
        Metrics {
            messages_sent: inner.metrics.messages_sent(),
            events_delivered: inner.metrics.events_delivered(),
            events_dropped: inner.metrics.events_dropped(),
            reconnect_count: inner.metrics.reconnect_count(),
            subscriptions: inner.registry.len(),
            queued_messages: inner.queue.len(),
            since_last_ping: inner.pong_tracker.time_since_last_ping(),
            since_last_pong: inner.pong_tracker.time_since_last_pong(),
            heartbeat_healthy: inner.pong_tracker.is_healthy(inner.config.ping_timeout),
            session_state: inner.state.get(),
        }
    }

    /// Try to receive a lifecycle event (non-blocking)
    pub fn try_recv_event(&self) -> Option<ClientEvent> {
        self.inner.event_rx.try_recv().ok()
    }

    /// Receive a lifecycle event (blocking)
    pub fn recv_event(&self) -> std::result::Result<ClientEvent, crossbeam_channel::RecvError> {
        self.inner.event_rx.recv()
    }

    /// Registry key for an address on the configured blockchain
    fn address_key(&self, address: &str) -> String {
        if self.inner.payloads.lowercases_addresses() {
            address.to_lowercase()
        } else {
            address.to_string()
        }
    }

    /// Watch an address
    ///
    /// Replaces any existing subscription for the same address. On ethereum
    /// the address is lower-cased first.
    pub fn subscribe_address(
        &self,
        address: &str,
        handler: impl SubscriptionHandler,
        filters: Option<Vec<Value>>,
        abi: Option<Abi>,
    ) -> Result<()> {
        let key = self.address_key(address);
        self.register(key, Subscription::address(handler, filters, abi))
    }

    /// Watch a transaction hash for events of `status` (`sent` when `None`)
    pub fn subscribe_transaction(
        &self,
        hash: &str,
        handler: impl SubscriptionHandler,
        status: Option<TxStatus>,
    ) -> Result<()> {
        self.register(
            hash.to_string(),
            Subscription::transaction(handler, status.unwrap_or_default()),
        )
    }

    fn register(&self, key: String, subscription: Subscription) -> Result<()> {
        let inner = &self.inner;
        // Holding the registry lock while checking the state pairs with `activate`:
        // the subscription is either in the replay or sent here, never both or neither.
        inner.registry.upsert_with(key, subscription, |key, subscription| {
            if inner.state.is_active() {
                inner.queue.push(inner.payloads.build(&subscription.replay_message(key))?);
                debug!(key, "Subscription queued");
            } else {
                debug!(key, "Subscription stored for the next session");
            }
            Ok(())
        })
    }

    /// Stop watching an address from outside a handler
    pub fn unsubscribe_address(&self, address: &str) -> Result<()> {
        let key = self.address_key(address);
        let inner = &self.inner;

        if inner.registry.remove(&key).is_some() && inner.state.is_active() {
            inner
                .queue
                .push(inner.payloads.build(&OutboundMessage::Unwatch { address: key })?);
        }
        Ok(())
    }

    /// Queue a message exactly as given, bypassing envelope construction
    pub fn send_raw(&self, message: Value) {
        self.inner.queue.push(message);
    }

    /// Stop the client
    ///
    /// An active session is closed and a running `connect` returns `Ok(())`.
    /// The client cannot be connected again afterwards.
    pub fn shutdown(&self) {
        info!("Shutting down stream client");
        self.inner.shutdown_tx.send_replace(true);
    }

    /// Run the client until shutdown or an unrecoverable error
    ///
    /// Sessions lost to transport failures or the websocket rate limit are
    /// reopened according to the reconnection strategy, replaying every
    /// subscription; failed handshakes while reconnecting are retried the
    /// same way. A failed first handshake, any other server error, a handler
    /// error or a malformed frame is returned. A malformed frame leaves the
    /// client [`SessionState::Invalid`] for good.
    pub async fn connect(&self, endpoint_override: Option<&str>) -> Result<()> {
        let inner = &self.inner;
        let url = endpoint_override.unwrap_or(&inner.config.endpoint).to_string();
        let mut shutdown_rx = inner.shutdown_tx.subscribe();

        if *shutdown_rx.borrow_and_update() {
            self.close();
            return Err(StreamError::Shutdown);
        }

        match inner
            .state
            .transition(SessionState::Disconnected, SessionState::Handshaking)
        {
            Ok(_) => {}
            Err(current) if current.is_running() => {
                return Err(StreamError::InvalidState(format!("connect called while {:?}", current)))
            }
            Err(SessionState::Invalid) => {
                return Err(StreamError::InvalidSession(
                    "session was invalidated by a malformed message".into(),
                ))
            }
            Err(_) => return Err(StreamError::Shutdown),
        }

        let mut attempt = 0usize;

        loop {
            if attempt > 0 {
                inner.state.set(SessionState::Handshaking);
                let _ = inner.event_tx.send(ClientEvent::Reconnecting(attempt));
            }

            info!(url = %url, attempt, "Connecting to event stream");
            let connected = tokio::select! {
                result = connect_async(url.as_str()) => result,
                _ = wait_for_shutdown(&mut shutdown_rx) => {
                    self.close();
                    return Ok(());
                }
            };

            let err = match connected {
                Ok((socket, _)) => match self.run_session(socket, &mut shutdown_rx).await {
                    SessionEnd::Shutdown => {
                        let _ = inner.event_tx.send(ClientEvent::Disconnected);
                        self.close();
                        return Ok(());
                    }
                    SessionEnd::Failed(err) => {
                        let _ = inner.event_tx.send(ClientEvent::Disconnected);
                        err
                    }
                },
                Err(e) => {
                    let err = StreamError::Handshake(e.to_string());
                    // Only the first handshake is surfaced; later ones go through the strategy
                    if attempt == 0 {
                        error!(url = %url, "Handshake failed: {}", e);
                        inner.state.set(SessionState::Disconnected);
                        let _ = inner.event_tx.send(ClientEvent::Error(err.to_string()));
                        return Err(err);
                    }
                    err
                }
            };

            let _ = inner.event_tx.send(ClientEvent::Error(err.to_string()));

            if matches!(err, StreamError::InvalidSession(_)) {
                error!("Session invalidated, not reconnecting: {}", err);
                inner.state.set(SessionState::Invalid);
                return Err(err);
            }

            inner.state.set(SessionState::Disconnected);

            let retry = err.is_recoverable() || matches!(err, StreamError::Handshake(_));
            if !retry {
                error!("Session failed: {}", err);
                return Err(err);
            }

            let Some(delay) = inner.config.reconnect_strategy.next_delay(attempt) else {
                error!(attempt, "Reconnection strategy gave up: {}", err);
                return Err(StreamError::ReconnectionFailed {
                    attempts: attempt,
                    reason: err.to_string(),
                });
            };

            warn!(
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                "Session lost: {}",
                err
            );

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = wait_for_shutdown(&mut shutdown_rx) => {
                    self.close();
                    return Ok(());
                }
            }

            attempt += 1;
            inner.metrics.increment_reconnects();
        }
    }

    /// Run one session until one of its loops fails or shutdown is requested
    async fn run_session(
        &self,
        socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
        shutdown_rx: &mut watch::Receiver<bool>,
    ) -> SessionEnd {
        let inner = &self.inner;
        let (sink, stream) = socket.split();
        let sink = Arc::new(Mutex::new(sink));
        inner.pong_tracker.reset();

        let replayed = match self.activate() {
            Ok(count) => count,
            Err(e) => return SessionEnd::Failed(e),
        };
        info!(replayed, subscriptions = inner.registry.len(), "Session active");
        let _ = inner.event_tx.send(ClientEvent::Connected);

        let router = EventRouter::new(
            inner.registry.clone(),
            inner.queue.clone(),
            Arc::clone(&inner.payloads),
            Arc::clone(&inner.state),
            Arc::clone(&inner.metrics),
        );

        let end = tokio::select! {
            result = run_dispatcher(
                inner.queue.clone(),
                Arc::clone(&sink),
                inner.config.send_interval,
                Arc::clone(&inner.metrics),
            ) => SessionEnd::Failed(loop_exit(result, "dispatcher")),
            result = run_receive_loop(stream, router, Arc::clone(&inner.pong_tracker)) => {
                SessionEnd::Failed(loop_exit(result, "receive loop"))
            }
            result = run_heartbeat(
                Arc::clone(&sink),
                Arc::clone(&inner.pong_tracker),
                inner.config.ping_interval,
                inner.config.ping_timeout,
            ) => SessionEnd::Failed(loop_exit(result, "heartbeat")),
            _ = wait_for_shutdown(shutdown_rx) => SessionEnd::Shutdown,
        };

        inner.state.set(SessionState::Draining);

        match tokio::time::timeout(CLOSE_TIMEOUT, sink.lock().await.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("Socket close failed: {}", e),
            Err(_) => debug!("Socket close timed out"),
        }

        let discarded = inner.queue.clear();
        if discarded > 0 {
            debug!(discarded, "Discarded unsent messages");
        }

        end
    }

    /// Queue the session replay and mark the session active
    ///
    /// Runs under the registry read lock, see `register`.
    fn activate(&self) -> Result<usize> {
        let inner = &self.inner;
        inner.registry.snapshot_with(|subscriptions| {
            let messages = replay_messages(inner.config.global_filters.as_deref(), subscriptions);
            for message in &messages {
                inner.queue.push(inner.payloads.build(message)?);
            }
            inner.state.set(SessionState::Active);
            Ok(messages.len())
        })
    }

    /// Move to `Closed`; an invalidated session keeps its `Invalid` state
    fn close(&self) {
        if !self.inner.state.get().is_terminal() {
            self.inner.state.set(SessionState::Closed);
        }
        info!("Stream client closed");
    }
}

/// Session loops only return on failure; an `Ok` exit still ends the session
fn loop_exit(result: Result<()>, name: &str) -> StreamError {
    match result {
        Err(e) => e,
        Ok(()) => StreamError::ConnectionClosed(format!("{} stopped", name)),
    }
}

async fn wait_for_shutdown(shutdown_rx: &mut watch::Receiver<bool>) {
    // A dropped sender also counts as shutdown
    let _ = shutdown_rx.wait_for(|stopped| *stopped).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::handler::handler_fn;

    fn client() -> StreamClient {
        StreamClient::builder().api_key("test-key").build().unwrap()
    }

    #[test]
    fn test_subscribe_before_connect_only_registers() {
        let client = client();
        client
            .subscribe_address("0xABCdef", handler_fn(|_, _| Ok(())), None, None)
            .unwrap();

        assert!(client.registry().contains("0xabcdef"));
        assert_eq!(client.metrics().queued_messages, 0);
    }

    #[test]
    fn test_subscribe_while_active_queues_immediately() {
        let client = client();
        client.inner.state.set(SessionState::Active);

        client
            .subscribe_transaction("0xhash", handler_fn(|_, _| Ok(())), Some(TxStatus::Pending))
            .unwrap();

        let queued = client.inner.queue.try_pop().unwrap();
        assert_eq!(queued["categoryCode"], "activeTransaction");
        assert_eq!(queued["eventCode"], "txPool");
        assert_eq!(queued["transaction"]["hash"], "0xhash");
    }

    #[test]
    fn test_addresses_keep_case_off_ethereum() {
        let client = StreamClient::builder()
            .api_key("test-key")
            .blockchain("bitcoin")
            .build()
            .unwrap();
        client
            .subscribe_address("bc1QAbC", handler_fn(|_, _| Ok(())), None, None)
            .unwrap();

        assert!(client.registry().contains("bc1QAbC"));
    }

    #[test]
    fn test_activate_queues_replay_in_order() {
        let client = StreamClient::builder()
            .api_key("test-key")
            .global_filters(vec![serde_json::json!({"status": "pending"})])
            .build()
            .unwrap();
        client
            .subscribe_address("0xaaa", handler_fn(|_, _| Ok(())), None, None)
            .unwrap();

        assert_eq!(client.activate().unwrap(), 3);
        assert_eq!(client.state(), SessionState::Active);

        let codes: Vec<_> = std::iter::from_fn(|| client.inner.queue.try_pop())
            .map(|m| format!("{}/{}", m["categoryCode"].as_str().unwrap(), m["eventCode"].as_str().unwrap()))
            .collect();
        assert_eq!(codes, vec!["configs/put", "initialize/checkDappId", "configs/put"]);
    }

    #[test]
    fn test_unsubscribe_address_outside_session() {
        let client = client();
        client
            .subscribe_address("0xaaa", handler_fn(|_, _| Ok(())), None, None)
            .unwrap();
        client.unsubscribe_address("0xAAA").unwrap();

        assert!(client.registry().is_empty());
        assert_eq!(client.metrics().queued_messages, 0);
    }

    #[tokio::test]
    async fn test_shutdown_keeps_invalid_state() {
        let client = client();
        client.inner.state.set(SessionState::Invalid);
        client.shutdown();

        let result = client.connect(None).await;
        assert!(matches!(result, Err(StreamError::Shutdown)));
        assert_eq!(client.state(), SessionState::Invalid);
    }

    #[tokio::test]
    async fn test_connect_while_running_is_rejected() {
        let client = client();
        client.inner.state.set(SessionState::Active);

        let result = client.connect(None).await;
        assert!(matches!(result, Err(StreamError::InvalidState(_))));
        assert_eq!(client.state(), SessionState::Active);
    }

    #[test]
    fn test_metrics_report_heartbeat() {
        let client = client();
        let metrics = client.metrics();
        assert!(metrics.since_last_ping.is_none());
        assert!(metrics.heartbeat_healthy);

        client.inner.pong_tracker.record_ping_sent();
        let metrics = client.metrics();
        assert!(metrics.since_last_ping.is_some());
        assert!(metrics.since_last_pong.is_none());
        // still inside the 10s default ping timeout
        assert!(metrics.heartbeat_healthy);
    }

    #[tokio::test]
    async fn test_connect_after_shutdown_fails() {
        let client = client();
        client.shutdown();

        let result = client.connect(None).await;
        assert!(matches!(result, Err(StreamError::Shutdown)));
        assert_eq!(client.state(), SessionState::Closed);
    }
}
