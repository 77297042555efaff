//! Subscription registry
//!
//! Owned by the client and shared with the router. Entries live in a
//! `BTreeMap` so a snapshot, and therefore the replay after a reconnect,
//! always comes out in the same order.

use crate::protocol::event::SubscriptionKind;
use crate::protocol::payload::{Abi, AddressConfig, OutboundMessage, TxStatus};
use crate::traits::handler::SubscriptionHandler;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

pub(crate) type SharedHandler = Arc<Mutex<Box<dyn SubscriptionHandler>>>;

/// A registered interest in an address or a transaction hash
#[derive(Clone)]
pub struct Subscription {
    kind: SubscriptionKind,
    filters: Option<Vec<Value>>,
    abi: Option<Abi>,
    status: TxStatus,
    handler: SharedHandler,
}

impl Subscription {
    pub fn address(handler: impl SubscriptionHandler, filters: Option<Vec<Value>>, abi: Option<Abi>) -> Self {
        Self {
            kind: SubscriptionKind::Address,
            filters,
            abi,
            status: TxStatus::default(),
            handler: Arc::new(Mutex::new(Box::new(handler))),
        }
    }

    pub fn transaction(handler: impl SubscriptionHandler, status: TxStatus) -> Self {
        Self {
            kind: SubscriptionKind::Transaction,
            filters: None,
            abi: None,
            status,
            handler: Arc::new(Mutex::new(Box::new(handler))),
        }
    }

    pub fn kind(&self) -> SubscriptionKind {
        self.kind
    }

    pub fn filters(&self) -> Option<&[Value]> {
        self.filters.as_deref()
    }

    pub fn abi(&self) -> Option<&Abi> {
        self.abi.as_ref()
    }

    /// Status a transaction watch is registered for
    pub fn status(&self) -> TxStatus {
        self.status
    }

    /// Message that (re)establishes this subscription on the server
    pub fn replay_message(&self, key: &str) -> OutboundMessage {
        match self.kind {
            SubscriptionKind::Address => OutboundMessage::ConfigPut(AddressConfig::address(
                key,
                self.filters.clone(),
                self.abi.clone(),
            )),
            SubscriptionKind::Transaction => OutboundMessage::txn_watch(key, self.status),
        }
    }

    pub(crate) fn handler(&self) -> SharedHandler {
        Arc::clone(&self.handler)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("kind", &self.kind)
            .field("filters", &self.filters)
            .field("abi", &self.abi.is_some())
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Keyed set of subscriptions, cheap to clone
#[derive(Clone, Default)]
pub struct SubscriptionRegistry {
    entries: Arc<RwLock<BTreeMap<String, Subscription>>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace, returning the replaced entry
    pub fn upsert(&self, key: impl Into<String>, subscription: Subscription) -> Option<Subscription> {
        self.entries.write().insert(key.into(), subscription)
    }

    /// Remove an entry; absent keys are ignored
    pub fn remove(&self, key: &str) -> Option<Subscription> {
        self.entries.write().remove(key)
    }

    /// Remove `key` only while it still holds `handler`
    ///
    /// A key re-subscribed with a new handler is left alone.
    pub(crate) fn remove_if_handler(&self, key: &str, handler: &SharedHandler) -> Option<Subscription> {
        let mut entries = self.entries.write();
        match entries.get(key) {
            Some(current) if Arc::ptr_eq(&current.handler, handler) => entries.remove(key),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<Subscription> {
        self.entries.read().get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    /// Entries in key order
    pub fn snapshot(&self) -> Vec<(String, Subscription)> {
        self.entries
            .read()
            .iter()
            .map(|(key, sub)| (key.clone(), sub.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Upsert and run `after` before the write lock is released
    ///
    /// Pairs with [`snapshot_with`](Self::snapshot_with): a subscription is
    /// either part of a snapshot or sees whatever `snapshot_with` published.
    pub(crate) fn upsert_with<R>(
        &self,
        key: String,
        subscription: Subscription,
        after: impl FnOnce(&str, &Subscription) -> R,
    ) -> R {
        let mut entries = self.entries.write();
        let result = after(&key, &subscription);
        entries.insert(key, subscription);
        result
    }

    /// Take a snapshot and run `during` while the read lock is still held
    pub(crate) fn snapshot_with<R>(&self, during: impl FnOnce(&[(String, Subscription)]) -> R) -> R {
        let entries = self.entries.read();
        let snapshot: Vec<_> = entries
            .iter()
            .map(|(key, sub)| (key.clone(), sub.clone()))
            .collect();
        during(&snapshot)
    }
}

impl fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries.read().iter()).finish()
    }
}

/// Messages sent at the start of every session, in order
///
/// Global filters (if any), then the init message, then one message per
/// registry entry.
pub fn replay_messages(
    global_filters: Option<&[Value]>,
    subscriptions: &[(String, Subscription)],
) -> Vec<OutboundMessage> {
    let mut messages = Vec::with_capacity(subscriptions.len() + 2);

    if let Some(filters) = global_filters {
        messages.push(OutboundMessage::ConfigPut(AddressConfig::global(filters.to_vec())));
    }
    messages.push(OutboundMessage::Init);
    messages.extend(
        subscriptions
            .iter()
            .map(|(key, subscription)| subscription.replay_message(key)),
    );

    messages
}
