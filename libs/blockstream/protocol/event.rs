//! Inbound events: echo filtering, subscription kind and flattening

use serde_json::{Map, Value};

/// Flattened event handed to subscription handlers
pub type Transaction = Map<String, Value>;

/// Event codes the server echoes back for messages this client sent
pub const ECHO_EVENT_CODES: [&str; 9] = [
    "txRequest",
    "nsfFail",
    "txRepeat",
    "txAwaitingApproval",
    "txConfirmReminder",
    "txSendFail",
    "txError",
    "txUnderPriced",
    "txSent",
];

pub fn is_server_echo(event_code: &str) -> bool {
    ECHO_EVENT_CODES.contains(&event_code)
}

/// What a subscription watches, and therefore how its events are looked up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubscriptionKind {
    /// Keyed by `transaction.watchedAddress`
    Address,
    /// Keyed by `transaction.hash`
    Transaction,
}

/// Decide which registry an event belongs to, `None` when it matches neither
pub fn subscription_kind(event: &Map<String, Value>) -> Option<SubscriptionKind> {
    let category = event.get("categoryCode").and_then(Value::as_str);
    let watched_by_hash = event
        .get("essentialFields")
        .and_then(|fields| fields.get("watchedAddress"))
        .and_then(Value::as_str)
        == Some("hash");

    if category == Some("activeTransaction") || watched_by_hash {
        Some(SubscriptionKind::Transaction)
    } else if category == Some("activeAddress") {
        Some(SubscriptionKind::Address)
    } else {
        None
    }
}

/// Registry key an event of `kind` is routed by
pub fn routing_key(event: &Map<String, Value>, kind: SubscriptionKind) -> Option<&str> {
    let field = match kind {
        SubscriptionKind::Address => "watchedAddress",
        SubscriptionKind::Transaction => "hash",
    };
    event
        .get("transaction")
        .and_then(|txn| txn.get(field))
        .and_then(Value::as_str)
}

/// Flatten an event into the map handed to handlers
///
/// `transaction` then `blockchain` fields are lifted to the top level,
/// `contractCall` stays nested, `dappId` is dropped and the remaining
/// top-level scalars are copied as-is. Later keys win on collision.
pub fn flatten_event(event: &Map<String, Value>) -> Transaction {
    let mut flattened = Transaction::new();

    for nested in ["transaction", "blockchain"] {
        if let Some(Value::Object(fields)) = event.get(nested) {
            flattened.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
    }

    if let Some(contract_call) = event.get("contractCall") {
        flattened.insert("contractCall".to_string(), contract_call.clone());
    }

    for (key, value) in event {
        match key.as_str() {
            "transaction" | "blockchain" | "contractCall" | "dappId" => continue,
            _ if value.is_object() || value.is_array() => continue,
            _ => {
                flattened.insert(key.clone(), value.clone());
            }
        }
    }

    flattened
}
