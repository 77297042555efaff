//! Extension points and error types shared by the blockstream client

pub mod error;
pub mod handler;
pub mod reconnect;

pub use error::{Result, ServerError, StreamError};
pub use handler::{handler_fn, FnHandler, SubscriptionHandler};
pub use reconnect::{ExponentialBackoff, FixedDelay, ReconnectionStrategy, DEFAULT_RECONNECT_DELAY};
