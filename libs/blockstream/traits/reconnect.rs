//! Reconnection strategies
//!
//! A strategy only answers "how long until the next attempt". The client
//! owns the attempt counter.

use std::time::Duration;

/// Delay used between reconnection attempts when nothing else is configured
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(500);

/// Decides how long the supervisor waits before opening a new connection
///
/// `attempt` counts reconnections since `connect` was called, starting at 0.
/// Returning `None` stops the supervisor and surfaces the last session error.
pub trait ReconnectionStrategy: Send + Sync {
    /// Delay before reconnection attempt number `attempt`
    ///
    /// # Arguments
    /// * `attempt` - Zero-based index of the attempt about to be made
    ///
    /// # Returns
    /// * `Some(delay)` - Sleep for `delay`, then reconnect
    /// * `None` - Stop reconnecting
    fn next_delay(&self, attempt: usize) -> Option<Duration>;

    /// Whether attempt number `attempt` is still allowed
    ///
    /// Must agree with [`next_delay`](Self::next_delay): `false` here means
    /// `next_delay` returns `None` for the same attempt.
    fn should_reconnect(&self, attempt: usize) -> bool;
}

/// Waits the same amount of time before every attempt
#[derive(Debug, Clone)]
pub struct FixedDelay {
    /// Sleep before every attempt
    delay: Duration,
    /// Attempts allowed before giving up, `None` for unlimited
    max_attempts: Option<usize>,
}

impl FixedDelay {
    /// `max_attempts = None` retries forever
    pub fn new(delay: Duration, max_attempts: Option<usize>) -> Self {
        Self { delay, max_attempts }
    }
}

impl Default for FixedDelay {
    fn default() -> Self {
        Self::new(DEFAULT_RECONNECT_DELAY, None)
    }
}

impl ReconnectionStrategy for FixedDelay {
    fn next_delay(&self, attempt: usize) -> Option<Duration> {
        self.should_reconnect(attempt).then_some(self.delay)
    }

    fn should_reconnect(&self, attempt: usize) -> bool {
        self.max_attempts.map_or(true, |max| attempt < max)
    }
}

/// Doubles the delay on every attempt up to `max_delay`
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    /// Delay before attempt 0
    initial_delay: Duration,
    /// Upper bound on any single delay
    max_delay: Duration,
    /// Attempts allowed before giving up, `None` for unlimited
    max_attempts: Option<usize>,
}

impl ExponentialBackoff {
    /// Create a backoff of `initial_delay * 2^attempt`, capped at `max_delay`
    ///
    /// # Arguments
    /// * `initial_delay` - Delay before the first attempt
    /// * `max_delay` - Cap applied after doubling
    /// * `max_attempts` - Attempt limit, `None` retries forever
    pub fn new(initial_delay: Duration, max_delay: Duration, max_attempts: Option<usize>) -> Self {
        Self {
            initial_delay,
            max_delay,
            max_attempts,
        }
    }
}

impl ReconnectionStrategy for ExponentialBackoff {
    fn next_delay(&self, attempt: usize) -> Option<Duration> {
        if !self.should_reconnect(attempt) {
            return None;
        }

        let factor = 2u32.saturating_pow(attempt.min(u32::MAX as usize) as u32);
        let delay = self.initial_delay.saturating_mul(factor);
        Some(delay.min(self.max_delay))
    }

    fn should_reconnect(&self, attempt: usize) -> bool {
        self.max_attempts.map_or(true, |max| attempt < max)
    }
}
