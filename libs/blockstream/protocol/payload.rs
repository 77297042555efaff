//! Outbound envelopes
//!
//! Messages are modelled as [`OutboundMessage`] and only turned into JSON by
//! [`PayloadBuilder::build`], right before they are queued.

use crate::traits::error::{Result, StreamError};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use std::str::FromStr;

/// Protocol version stamped on every envelope
pub const API_VERSION: &str = "1";

/// The only blockchain system whose addresses are lower-cased
pub const ETHEREUM: &str = "ethereum";

/// Scope used for connection-wide filters
pub const GLOBAL_SCOPE: &str = "global";

/// Resolve a network id to the name the server expects
pub fn network_name(network_id: u64) -> Result<&'static str> {
    match network_id {
        1 => Ok("main"),
        3 => Ok("ropsten"),
        4 => Ok("rinkeby"),
        5 => Ok("goerli"),
        42 => Ok("kovan"),
        100 => Ok("xdai"),
        56 => Ok("bsc-main"),
        other => Err(StreamError::UnknownNetwork(other)),
    }
}

/// Transaction lifecycle status a transaction watch is registered for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TxStatus {
    #[default]
    Sent,
    Pending,
    PendingSimulation,
    Stuck,
    Confirmed,
    Failed,
    Speedup,
    Cancel,
    Dropped,
}

impl TxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxStatus::Sent => "sent",
            TxStatus::Pending => "pending",
            TxStatus::PendingSimulation => "pending-simulation",
            TxStatus::Stuck => "stuck",
            TxStatus::Confirmed => "confirmed",
            TxStatus::Failed => "failed",
            TxStatus::Speedup => "speedup",
            TxStatus::Cancel => "cancel",
            TxStatus::Dropped => "dropped",
        }
    }

    /// Event code of the `activeTransaction` envelope for this status
    pub fn event_code(&self) -> &'static str {
        match self {
            TxStatus::Sent => "txSent",
            TxStatus::Pending => "txPool",
            TxStatus::PendingSimulation => "txPoolSimulation",
            TxStatus::Stuck => "txStuck",
            TxStatus::Confirmed => "txConfirmed",
            TxStatus::Failed => "txFailed",
            TxStatus::Speedup => "txSpeedUp",
            TxStatus::Cancel => "txCancel",
            TxStatus::Dropped => "txDropped",
        }
    }
}

impl FromStr for TxStatus {
    type Err = StreamError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sent" => Ok(TxStatus::Sent),
            "pending" => Ok(TxStatus::Pending),
            "pending-simulation" => Ok(TxStatus::PendingSimulation),
            "stuck" => Ok(TxStatus::Stuck),
            "confirmed" => Ok(TxStatus::Confirmed),
            "failed" => Ok(TxStatus::Failed),
            "speedup" => Ok(TxStatus::Speedup),
            "cancel" => Ok(TxStatus::Cancel),
            "dropped" => Ok(TxStatus::Dropped),
            other => Err(StreamError::UnknownStatus(other.to_string())),
        }
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Contract ABI used by the server to decode calls to a watched contract
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Abi(Value);

impl Abi {
    /// Parse an ABI given as a JSON document
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(Self(serde_json::from_str(json)?))
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

impl From<Value> for Abi {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// `config` object of a `configs/put` envelope
///
/// Unset fields are left out of the wire form.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressConfig {
    pub scope: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abi: Option<Abi>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watch_address: Option<bool>,
}

impl AddressConfig {
    /// Connection-wide filters
    pub fn global(filters: Vec<Value>) -> Self {
        Self {
            scope: GLOBAL_SCOPE.to_string(),
            filters: Some(filters),
            abi: None,
            watch_address: None,
        }
    }

    /// Watch an address, optionally filtered and with a contract ABI
    pub fn address(address: impl Into<String>, filters: Option<Vec<Value>>, abi: Option<Abi>) -> Self {
        Self {
            scope: address.into(),
            filters,
            abi,
            watch_address: Some(true),
        }
    }
}

/// Every message the client sends
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMessage {
    /// `initialize/checkDappId`
    Init,
    /// `configs/put`
    ConfigPut(AddressConfig),
    /// `activeTransaction/<status event code>`
    TxnWatch {
        hash: String,
        status: TxStatus,
        start_time_ms: i64,
    },
    /// `accountAddress/unwatch`
    Unwatch { address: String },
    /// Sent as given, without an envelope
    Raw(Value),
}

impl OutboundMessage {
    /// Transaction watch stamped with the current time
    pub fn txn_watch(hash: impl Into<String>, status: TxStatus) -> Self {
        OutboundMessage::TxnWatch {
            hash: hash.into(),
            status,
            start_time_ms: Utc::now().timestamp_millis(),
        }
    }

    /// `(categoryCode, eventCode)` of the envelope, `None` for raw messages
    pub fn codes(&self) -> Option<(&'static str, &'static str)> {
        match self {
            OutboundMessage::Init => Some(("initialize", "checkDappId")),
            OutboundMessage::ConfigPut(_) => Some(("configs", "put")),
            OutboundMessage::TxnWatch { status, .. } => Some(("activeTransaction", status.event_code())),
            OutboundMessage::Unwatch { .. } => Some(("accountAddress", "unwatch")),
            OutboundMessage::Raw(_) => None,
        }
    }
}

/// `blockchain` object of the envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockchainId {
    pub system: String,
    pub network: String,
}

/// Builds envelopes for one API key and blockchain
#[derive(Debug, Clone)]
pub struct PayloadBuilder {
    api_key: String,
    blockchain: BlockchainId,
}

impl PayloadBuilder {
    /// Fails with [`StreamError::UnknownNetwork`] when the id is not in the network table
    pub fn new(api_key: impl Into<String>, system: impl Into<String>, network_id: u64) -> Result<Self> {
        Ok(Self {
            api_key: api_key.into(),
            blockchain: BlockchainId {
                system: system.into(),
                network: network_name(network_id)?.to_string(),
            },
        })
    }

    pub fn blockchain(&self) -> &BlockchainId {
        &self.blockchain
    }

    /// Whether subscription keys are compared lower-cased for this blockchain
    pub fn lowercases_addresses(&self) -> bool {
        self.blockchain.system == ETHEREUM
    }

    /// Stamp the common envelope fields and merge `payload` at the top level
    pub fn build_envelope(&self, category_code: &str, event_code: &str, payload: Map<String, Value>) -> Value {
        let mut envelope = json!({
            "timeStamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            "dappId": self.api_key,
            "version": API_VERSION,
            "blockchain": {
                "system": self.blockchain.system,
                "network": self.blockchain.network,
            },
            "categoryCode": category_code,
            "eventCode": event_code,
        });

        if let Value::Object(fields) = &mut envelope {
            fields.extend(payload);
        }
        envelope
    }

    /// Convert a message to its wire form
    pub fn build(&self, message: &OutboundMessage) -> Result<Value> {
        let mut payload = Map::new();
        match message {
            OutboundMessage::Raw(value) => return Ok(value.clone()),
            OutboundMessage::Init => {}
            OutboundMessage::ConfigPut(config) => {
                payload.insert("config".into(), serde_json::to_value(config)?);
            }
            OutboundMessage::TxnWatch {
                hash,
                status,
                start_time_ms,
            } => {
                payload.insert(
                    "transaction".into(),
                    json!({
                        "hash": hash,
                        "startTime": start_time_ms,
                        "status": status.as_str(),
                    }),
                );
            }
            OutboundMessage::Unwatch { address } => {
                payload.insert("account".into(), json!({ "address": address }));
            }
        }

        let (category_code, event_code) = message.codes().unwrap_or_default();
        Ok(self.build_envelope(category_code, event_code, payload))
    }

    pub fn build_init_message(&self) -> Value {
        self.build_envelope("initialize", "checkDappId", Map::new())
    }

    pub fn build_config_message(
        &self,
        scope: &str,
        watch_address: Option<bool>,
        filters: Option<Vec<Value>>,
        abi: Option<Abi>,
    ) -> Result<Value> {
        self.build(&OutboundMessage::ConfigPut(AddressConfig {
            scope: scope.to_string(),
            filters,
            abi,
            watch_address,
        }))
    }

    /// Fails with [`StreamError::UnknownStatus`] for statuses outside the event code table
    pub fn build_txn_watch_message(&self, hash: &str, status: &str) -> Result<Value> {
        let status: TxStatus = status.parse()?;
        self.build(&OutboundMessage::txn_watch(hash, status))
    }

    pub fn build_unwatch_message(&self, address: &str) -> Result<Value> {
        self.build(&OutboundMessage::Unwatch {
            address: address.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> PayloadBuilder {
        PayloadBuilder::new("test-key", ETHEREUM, 1).unwrap()
    }

    #[test]
    fn test_network_table() {
        assert_eq!(network_name(1).unwrap(), "main");
        assert_eq!(network_name(5).unwrap(), "goerli");
        assert_eq!(network_name(56).unwrap(), "bsc-main");
        assert!(matches!(network_name(2), Err(StreamError::UnknownNetwork(2))));
    }

    #[test]
    fn test_unknown_network_fails_construction() {
        let result = PayloadBuilder::new("key", ETHEREUM, 999);
        assert!(matches!(result, Err(StreamError::UnknownNetwork(999))));
    }

    #[test]
    fn test_envelope_common_fields() {
        let msg = builder().build_init_message();

        assert_eq!(msg["dappId"], "test-key");
        assert_eq!(msg["version"], API_VERSION);
        assert_eq!(msg["blockchain"], json!({"system": "ethereum", "network": "main"}));
        assert_eq!(msg["categoryCode"], "initialize");
        assert_eq!(msg["eventCode"], "checkDappId");
        assert!(msg["timeStamp"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn test_config_message_omits_unset_fields() {
        let msg = builder()
            .build_config_message("0xabc", Some(true), None, None)
            .unwrap();

        assert_eq!(msg["categoryCode"], "configs");
        assert_eq!(msg["eventCode"], "put");
        assert_eq!(msg["config"], json!({"scope": "0xabc", "watchAddress": true}));
    }

    #[test]
    fn test_global_config_has_no_watch_address() {
        let filters = vec![json!({"status": "pending"})];
        let msg = builder()
            .build(&OutboundMessage::ConfigPut(AddressConfig::global(filters)))
            .unwrap();

        assert_eq!(
            msg["config"],
            json!({"scope": "global", "filters": [{"status": "pending"}]})
        );
    }

    #[test]
    fn test_config_with_abi() {
        let abi = Abi::from_json_str(r#"[{"name": "transfer", "type": "function"}]"#).unwrap();
        let msg = builder()
            .build(&OutboundMessage::ConfigPut(AddressConfig::address("0xabc", None, Some(abi))))
            .unwrap();

        assert_eq!(msg["config"]["abi"][0]["name"], "transfer");
        assert_eq!(msg["config"]["watchAddress"], true);
    }

    #[test]
    fn test_invalid_abi_string() {
        assert!(matches!(Abi::from_json_str("not json"), Err(StreamError::Json(_))));
    }

    #[test]
    fn test_txn_watch_event_codes() {
        let b = builder();
        let cases = [
            ("sent", "txSent"),
            ("pending", "txPool"),
            ("pending-simulation", "txPoolSimulation"),
            ("stuck", "txStuck"),
            ("confirmed", "txConfirmed"),
            ("failed", "txFailed"),
            ("speedup", "txSpeedUp"),
            ("cancel", "txCancel"),
            ("dropped", "txDropped"),
        ];

        for (status, event_code) in cases {
            let msg = b.build_txn_watch_message("0xhash", status).unwrap();
            assert_eq!(msg["categoryCode"], "activeTransaction");
            assert_eq!(msg["eventCode"], event_code, "status {}", status);
            assert_eq!(msg["transaction"]["hash"], "0xhash");
            assert_eq!(msg["transaction"]["status"], status);
            assert!(msg["transaction"]["startTime"].is_number());
        }
    }

    #[test]
    fn test_unknown_status_fails() {
        let result = builder().build_txn_watch_message("0xhash", "mined");
        assert!(matches!(result, Err(StreamError::UnknownStatus(s)) if s == "mined"));
    }

    #[test]
    fn test_unwatch_message() {
        let msg = builder().build_unwatch_message("0xabc").unwrap();
        assert_eq!(msg["categoryCode"], "accountAddress");
        assert_eq!(msg["eventCode"], "unwatch");
        assert_eq!(msg["account"], json!({"address": "0xabc"}));
    }

    #[test]
    fn test_raw_message_is_sent_as_is() {
        let raw = json!({"anything": [1, 2, 3]});
        let msg = builder().build(&OutboundMessage::Raw(raw.clone())).unwrap();
        assert_eq!(msg, raw);
    }

    #[test]
    fn test_address_lowercasing_only_for_ethereum() {
        assert!(builder().lowercases_addresses());
        let bitcoin = PayloadBuilder::new("key", "bitcoin", 1).unwrap();
        assert!(!bitcoin.lowercases_addresses());
    }
}
