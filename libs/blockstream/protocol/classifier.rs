//! Maps the `status`/`reason` of an inbound frame to a [`ServerError`]

use crate::traits::error::ServerError;
use serde_json::{Map, Value};

const STATUS_OK: &str = "ok";

const RATE_LIMIT: &str = "ratelimit";
const MESSAGE_TOO_LARGE: &str = "message too large";
const UNSUPPORTED_API_VERSION: &str = "api version not supported";
const MISSING_API_KEY: &str = "missing dappId";
const INVALID_API_KEY: &str = "is not a valid API key";
const EVENT_RATE_LIMIT: &str = "event rate limit";
const SIMULATED_EVENT_RATE_LIMIT: &str = "Simulated transactions limit";

/// Check the status of an inbound message
///
/// `ok` never fails, and neither does a non-`ok` status without a `reason`.
/// Reasons are matched in a fixed order, the first rule wins.
pub fn check_status(message: &Map<String, Value>) -> Result<(), ServerError> {
    if message.get("status").and_then(Value::as_str) == Some(STATUS_OK) {
        return Ok(());
    }

    match message.get("reason") {
        None | Some(Value::Null) => Ok(()),
        Some(Value::String(reason)) => Err(classify_reason(reason)),
        Some(other) => Err(classify_reason(&other.to_string())),
    }
}

/// Classify a server reason string
///
/// Surrounding whitespace is stripped before matching and is not kept.
pub fn classify_reason(reason: &str) -> ServerError {
    let reason = reason.trim();
    let owned = reason.to_string();

    if reason == RATE_LIMIT {
        ServerError::RateLimit(owned)
    } else if reason == MESSAGE_TOO_LARGE {
        ServerError::MessageTooLarge(owned)
    } else if reason.contains(MISSING_API_KEY) {
        ServerError::MissingApiKey(owned)
    } else if reason == UNSUPPORTED_API_VERSION {
        ServerError::UnsupportedApiVersion(owned)
    } else if reason.contains(INVALID_API_KEY) {
        ServerError::InvalidApiKey(owned)
    } else if reason.contains(EVENT_RATE_LIMIT) {
        ServerError::EventRateLimit(owned)
    } else if reason.contains(SIMULATED_EVENT_RATE_LIMIT) {
        ServerError::SimulatedEventRateLimit(owned)
    } else {
        ServerError::Other(owned)
    }
}
