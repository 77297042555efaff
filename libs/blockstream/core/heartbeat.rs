//! Heartbeat monitor
//!
//! Runs as one of the three session loops:
//!
//! ```text
//! ┌──────────────────────────────┐
//! │  Heartbeat                   │
//! │  1. send Ping ───────────────┼──> shared socket sink
//! │  2. wait for pong (timeout) <┼─── PongTracker <── receive loop
//! │  3. sleep ping_interval      │
//! └──────────────────────────────┘
//! ```
//!
//! A missing pong or a failed write ends the loop, which ends the session.

use crate::core::pong_tracker::PongTracker;
use crate::traits::error::{Result, StreamError};
use futures::{Sink, SinkExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, warn};

/// Ping the server every `ping_interval` and require a pong within `ping_timeout`
///
/// # Arguments
/// * `sink` - Write half shared with the dispatcher
/// * `tracker` - Fed by the receive loop whenever a pong arrives
/// * `ping_interval` - Sleep between a pong and the next ping
/// * `ping_timeout` - Limit on the ping write plus the pong wait
///
/// # Returns
/// Never returns `Ok`. Fails with [`StreamError::HeartbeatTimeout`] when a
/// pong is late, or [`StreamError::WebSocket`] when the ping cannot be sent.
pub async fn run_heartbeat<S>(
    sink: Arc<Mutex<S>>,
    tracker: Arc<PongTracker>,
    ping_interval: Duration,
    ping_timeout: Duration,
) -> Result<()>
where
    S: Sink<Message, Error = WsError> + Unpin,
{
    loop {
        let mut pongs = tracker.subscribe();
        pongs.borrow_and_update();

        let round_trip = async {
            sink.lock()
                .await
                .send(Message::Ping(Vec::new()))
                .await
                .map_err(|e| StreamError::WebSocket(e.to_string()))?;
            tracker.record_ping_sent();

            pongs
                .changed()
                .await
                .map_err(|_| StreamError::ConnectionClosed("pong tracker dropped".into()))
        };

        match tokio::time::timeout(ping_timeout, round_trip).await {
            Ok(Ok(())) => debug!("Heartbeat pong received"),
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                warn!(timeout_ms = ping_timeout.as_millis() as u64, "No pong before heartbeat timeout");
                return Err(StreamError::HeartbeatTimeout(ping_timeout));
            }
        }

        tokio::time::sleep(ping_interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::mpsc;
    use futures::StreamExt;

    fn channel_sink() -> (
        impl Sink<Message, Error = WsError> + Unpin,
        mpsc::UnboundedReceiver<Message>,
    ) {
        let (tx, rx) = mpsc::unbounded();
        (tx.sink_map_err(|_| WsError::ConnectionClosed), rx)
    }

    #[tokio::test]
    async fn test_times_out_without_pong() {
        let (sink, mut rx) = channel_sink();
        let tracker = Arc::new(PongTracker::new());

        let result = run_heartbeat(
            Arc::new(Mutex::new(sink)),
            tracker,
            Duration::from_millis(10),
            Duration::from_millis(30),
        )
        .await;

        assert!(matches!(result, Err(StreamError::HeartbeatTimeout(t)) if t == Duration::from_millis(30)));
        assert!(matches!(rx.next().await, Some(Message::Ping(_))));
    }

    #[tokio::test]
    async fn test_keeps_running_while_pongs_arrive() {
        let (sink, mut rx) = channel_sink();
        let tracker = Arc::new(PongTracker::new());

        // answer every ping like a healthy server would
        let responder = {
            let tracker = Arc::clone(&tracker);
            tokio::spawn(async move {
                let mut pings = 0;
                while let Some(Message::Ping(_)) = rx.next().await {
                    pings += 1;
                    tracker.record_pong_received();
                }
                pings
            })
        };

        let result = tokio::time::timeout(
            Duration::from_millis(120),
            run_heartbeat(
                Arc::new(Mutex::new(sink)),
                Arc::clone(&tracker),
                Duration::from_millis(10),
                Duration::from_millis(50),
            ),
        )
        .await;

        assert!(result.is_err(), "heartbeat should still be running");
        let pings = responder.await.unwrap();
        assert!(pings >= 3, "expected several pings, got {}", pings);
        assert!(tracker.time_since_last_pong().is_some());
    }

    #[tokio::test]
    async fn test_write_failure_ends_heartbeat() {
        let (sink, rx) = channel_sink();
        drop(rx);

        let result = run_heartbeat(
            Arc::new(Mutex::new(sink)),
            Arc::new(PongTracker::new()),
            Duration::from_millis(10),
            Duration::from_millis(50),
        )
        .await;

        assert!(matches!(result, Err(StreamError::WebSocket(_))));
    }
}
