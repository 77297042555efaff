use crate::core::router::Unsubscribe;
use crate::protocol::event::Transaction;
use crate::traits::error::Result;

/// Callback invoked for every event routed to a subscription
///
/// Runs on the receive loop, so a slow handler delays every later event.
/// Address subscriptions get an [`Unsubscribe`] bound to their address;
/// transaction subscriptions get `None`. Returning an error ends the
/// session and is surfaced from `connect`.
pub trait SubscriptionHandler: Send + 'static {
    fn handle(&mut self, transaction: Transaction, unsubscribe: Option<Unsubscribe>) -> Result<()>;
}

/// Handler backed by a closure, see [`handler_fn`]
pub struct FnHandler<F> {
    f: F,
}

impl<F> SubscriptionHandler for FnHandler<F>
where
    F: FnMut(Transaction, Option<Unsubscribe>) -> Result<()> + Send + 'static,
{
    fn handle(&mut self, transaction: Transaction, unsubscribe: Option<Unsubscribe>) -> Result<()> {
        (self.f)(transaction, unsubscribe)
    }
}

/// Wrap a closure as a [`SubscriptionHandler`]
///
/// ```ignore
/// client.subscribe_address(address, handler_fn(|txn, unsubscribe| {
///     println!("{:?}", txn.get("status"));
///     Ok(())
/// }), None, None)?;
/// ```
pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
    F: FnMut(Transaction, Option<Unsubscribe>) -> Result<()> + Send + 'static,
{
    FnHandler { f }
}
