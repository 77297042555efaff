//! Pong bookkeeping for the heartbeat
//!
//! The receive loop records pongs as they arrive; the heartbeat waits on
//! [`PongTracker::subscribe`] for the pong answering its own ping.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Last ping/pong times plus a wake-up channel for pongs
///
/// Timestamps are stored as milliseconds since an internal epoch so they fit
/// in atomics. Zero means "never".
pub struct PongTracker {
    /// Reference point for the millisecond timestamps below
    epoch: Instant,
    /// When the last ping was written, 0 if none this session
    last_ping_sent_ms: AtomicU64,
    /// When the last pong arrived, 0 if none this session
    last_pong_received_ms: AtomicU64,
    /// Pong counter; bumping it wakes every subscriber
    pongs: watch::Sender<u64>,
}

impl PongTracker {
    pub fn new() -> Self {
        let (pongs, _) = watch::channel(0);
        Self {
            epoch: Instant::now(),
            last_ping_sent_ms: AtomicU64::new(0),
            last_pong_received_ms: AtomicU64::new(0),
            pongs,
        }
    }

    fn now_ms(&self) -> u64 {
        // +1 so a record made in the first millisecond is not read as "never"
        self.epoch.elapsed().as_millis() as u64 + 1
    }

    /// Record that a ping frame was written to the socket
    pub fn record_ping_sent(&self) {
        self.last_ping_sent_ms.store(self.now_ms(), Ordering::Release);
    }

    /// Record a pong and wake anyone waiting on [`subscribe`](Self::subscribe)
    pub fn record_pong_received(&self) {
        self.last_pong_received_ms.store(self.now_ms(), Ordering::Release);
        self.pongs.send_modify(|count| *count = count.wrapping_add(1));
    }

    /// Receiver that reports every pong recorded after it was marked seen
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.pongs.subscribe()
    }

    /// Total pongs recorded since the tracker was created
    pub fn pong_count(&self) -> u64 {
        *self.pongs.borrow()
    }

    /// Whether the heartbeat is keeping up
    ///
    /// # Arguments
    /// * `timeout` - How long a ping may stay unanswered
    ///
    /// # Returns
    /// `true` when no ping is outstanding, or when the outstanding ping was
    /// sent less than `timeout` ago
    pub fn is_healthy(&self, timeout: Duration) -> bool {
        let ping_ms = self.last_ping_sent_ms.load(Ordering::Acquire);
        let pong_ms = self.last_pong_received_ms.load(Ordering::Acquire);

        if ping_ms == 0 || pong_ms >= ping_ms {
            return true;
        }

        self.now_ms().saturating_sub(ping_ms) < timeout.as_millis() as u64
    }

    /// Time since the last pong, `None` if none arrived this session
    pub fn time_since_last_pong(&self) -> Option<Duration> {
        Self::since(self.now_ms(), self.last_pong_received_ms.load(Ordering::Acquire))
    }

    /// Time since the last ping, `None` if none was sent this session
    pub fn time_since_last_ping(&self) -> Option<Duration> {
        Self::since(self.now_ms(), self.last_ping_sent_ms.load(Ordering::Acquire))
    }

    fn since(now_ms: u64, then_ms: u64) -> Option<Duration> {
        (then_ms != 0).then(|| Duration::from_millis(now_ms.saturating_sub(then_ms)))
    }

    /// Forget ping/pong times, called at the start of every session
    pub fn reset(&self) {
        self.last_ping_sent_ms.store(0, Ordering::Release);
        self.last_pong_received_ms.store(0, Ordering::Release);
    }
}

impl Default for PongTracker {
    fn default() -> Self {
        Self::new()
    }
}
