//! # blockstream
//!
//! Client core for a push-notification stream of blockchain transaction and
//! address events over a single websocket.
//!
//! ## Features
//!
//! - **Subscription registry**: address and transaction-hash subscriptions,
//!   replayed in a stable order on every (re)connect
//! - **Paced dispatcher**: unbounded outbound queue drained at a fixed rate
//! - **Event routing**: echo filtering, flattening and per-subscription handlers
//!   with an unsubscribe capability
//! - **Heartbeat**: ping/pong liveness with a timeout
//! - **Supervisor**: reconnects after transport failures, surfaces server,
//!   handler and protocol errors
//!
//! ## Example
//!
//! ```rust,ignore
//! use blockstream::{handler_fn, StreamClient, TxStatus};
//!
//! #[tokio::main]
//! async fn main() -> blockstream::Result<()> {
//!     let client = StreamClient::builder().api_key("my-api-key").build()?;
//!
//!     client.subscribe_transaction(
//!         "0xd6f98c52a1cd7a4b39aeae5bd3919f699b7e0323d8fc2a91a9ba9163614cb9d7",
//!         handler_fn(|txn, _| {
//!             println!("{} is {}", txn["hash"], txn["status"]);
//!             Ok(())
//!         }),
//!         Some(TxStatus::Confirmed),
//!     )?;
//!
//!     client.connect(None).await
//! }
//! ```

pub mod core;
pub mod protocol;
pub mod traits;

// Re-export all traits
pub use traits::*;

pub use crate::core::{
    builder, client, config, connection_state,
    builder::{states, StreamClientBuilder},
    client::{ClientEvent, Metrics, StreamClient},
    config::StreamConfig,
    connection_state::{AtomicMetrics, AtomicSessionState, SessionState},
    registry::{Subscription, SubscriptionRegistry},
    router::{Routed, Unsubscribe},
};

pub use protocol::{Abi, OutboundMessage, PayloadBuilder, SubscriptionKind, Transaction, TxStatus};
