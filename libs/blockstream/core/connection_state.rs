//! Lock-free session state and counters shared between the supervisor,
//! the session loops and callers holding a client handle

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

/// Lifecycle of the client's connection
///
/// ```text
/// Disconnected -> Handshaking -> Active -> Draining -> Disconnected -> ...
///                                   |
///                                   +--> Closed (shutdown) | Invalid (malformed frame)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SessionState {
    Disconnected = 0,
    Handshaking = 1,
    Active = 2,
    Draining = 3,
    Closed = 4,
    Invalid = 5,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SessionState::Disconnected,
            1 => SessionState::Handshaking,
            2 => SessionState::Active,
            3 => SessionState::Draining,
            4 => SessionState::Closed,
            _ => SessionState::Invalid,
        }
    }

    /// No further connection will be attempted from this state
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Invalid)
    }

    /// A `connect` call currently owns the session
    pub fn is_running(&self) -> bool {
        matches!(
            self,
            SessionState::Handshaking | SessionState::Active | SessionState::Draining
        )
    }
}

#[derive(Debug)]
pub struct AtomicSessionState(AtomicU8);

impl AtomicSessionState {
    pub fn new(state: SessionState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    #[inline]
    pub fn get(&self) -> SessionState {
        SessionState::from_u8(self.0.load(Ordering::Acquire))
    }

    #[inline]
    pub fn set(&self, state: SessionState) {
        self.0.store(state as u8, Ordering::Release);
    }

    /// Move to `new` only if the current state is `current`
    ///
    /// Returns the state observed before the attempt.
    pub fn transition(&self, current: SessionState, new: SessionState) -> Result<SessionState, SessionState> {
        self.0
            .compare_exchange(current as u8, new as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(SessionState::from_u8)
            .map_err(SessionState::from_u8)
    }

    /// Subscriptions are sent straight away only in this state
    #[inline]
    pub fn is_active(&self) -> bool {
        self.get() == SessionState::Active
    }
}

impl Default for AtomicSessionState {
    fn default() -> Self {
        Self::new(SessionState::Disconnected)
    }
}

/// Counters updated by the session loops
#[derive(Debug, Default)]
pub struct AtomicMetrics {
    messages_sent: AtomicU64,
    events_delivered: AtomicU64,
    events_dropped: AtomicU64,
    reconnect_count: AtomicU64,
}

impl AtomicMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn increment_sent(&self) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_delivered(&self) {
        self.events_delivered.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_dropped(&self) {
        self.events_dropped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_reconnects(&self) {
        self.reconnect_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn messages_sent(&self) -> u64 {
        self.messages_sent.load(Ordering::Relaxed)
    }

    pub fn events_delivered(&self) -> u64 {
        self.events_delivered.load(Ordering::Relaxed)
    }

    pub fn events_dropped(&self) -> u64 {
        self.events_dropped.load(Ordering::Relaxed)
    }

    pub fn reconnect_count(&self) -> u64 {
        self.reconnect_count.load(Ordering::Relaxed)
    }
}
