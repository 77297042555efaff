//! Connection and session core
//!
//! One [`StreamClient`] owns the subscription registry and the send queue.
//! `connect` supervises sessions; each session runs three loops under a
//! single `tokio::select!`, so they start together and stop together:
//!
//! ```text
//!             ┌─ dispatcher ─────── SendQueue ──> socket
//! session ────┼─ receive loop ───── socket ──> EventRouter ──> handlers
//!             └─ heartbeat ──────── ping/pong ──> PongTracker
//! ```

pub mod builder;
pub mod client;
pub mod config;
pub mod connection_state;
pub mod dispatcher;
pub mod heartbeat;
pub mod pong_tracker;
pub mod registry;
pub mod router;

pub use builder::{states, StreamClientBuilder};
pub use client::{ClientEvent, Metrics, StreamClient};
pub use config::StreamConfig;
pub use connection_state::{AtomicMetrics, AtomicSessionState, SessionState};
pub use dispatcher::SendQueue;
pub use pong_tracker::PongTracker;
pub use registry::{replay_messages, Subscription, SubscriptionRegistry};
pub use router::{EventRouter, Routed, Unsubscribe};

/// Create a new stream client builder
pub fn builder() -> StreamClientBuilder<states::NoApiKey> {
    StreamClientBuilder::new()
}
