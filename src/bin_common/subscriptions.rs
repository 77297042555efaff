//! Subscription file loader
//!
//! A subscription file is a YAML (or JSON) list of entries:
//!
//! ```yaml
//! - name: global
//!   id: global
//!   filters:
//!     - status: pending
//! - name: uniswap-router
//!   id: "0x7a250d5630b4cf539739df2c5dacb4c659f2488d"
//!   filters:
//!     - value: { gt: 0 }
//!   abi: '[{"name": "swapExactTokensForTokens", "type": "function"}]'
//! ```
//!
//! The entry named `global` supplies the global filters; every other entry is
//! an address subscription.

use anyhow::{Context, Result};
use blockstream::Abi;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

const GLOBAL_ENTRY: &str = "global";

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionEntry {
    pub name: String,
    pub id: String,
    #[serde(default)]
    pub filters: Option<Vec<Value>>,
    /// Either a structured ABI or its JSON text
    #[serde(default)]
    pub abi: Option<Value>,
}

impl SubscriptionEntry {
    /// ABI in structured form, parsing it if it was given as a string
    pub fn abi(&self) -> Result<Option<Abi>> {
        match &self.abi {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(text)) => {
                let abi = Abi::from_json_str(text)
                    .with_context(|| format!("Invalid ABI for subscription {}", self.name))?;
                Ok(Some(abi))
            }
            Some(value) => Ok(Some(Abi::from(value.clone()))),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SubscriptionFile {
    pub global_filters: Option<Vec<Value>>,
    pub addresses: Vec<SubscriptionEntry>,
}

pub fn parse_subscriptions(text: &str) -> Result<SubscriptionFile> {
    let entries: Vec<SubscriptionEntry> =
        serde_yaml::from_str(text).context("Failed to parse subscription file")?;

    let mut file = SubscriptionFile::default();
    for entry in entries {
        if entry.name == GLOBAL_ENTRY {
            file.global_filters = entry.filters;
        } else {
            file.addresses.push(entry);
        }
    }
    Ok(file)
}

pub fn load_subscriptions(path: impl AsRef<Path>) -> Result<SubscriptionFile> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read subscription file {}", path.display()))?;
    parse_subscriptions(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SAMPLE: &str = r#"
- name: global
  id: global
  filters:
    - status: pending
- name: router
  id: "0x7a250d5630b4cf539739df2c5dacb4c659f2488d"
  filters:
    - value: { gt: 0 }
  abi: '[{"name": "swap", "type": "function"}]'
- name: wallet
  id: "0xabc"
"#;

    #[test]
    fn test_global_entry_becomes_global_filters() {
        let file = parse_subscriptions(SAMPLE).unwrap();

        assert_eq!(file.global_filters, Some(vec![json!({"status": "pending"})]));
        assert_eq!(file.addresses.len(), 2);
        assert!(file.addresses.iter().all(|e| e.name != "global"));
    }

    #[test]
    fn test_string_abi_is_parsed() {
        let file = parse_subscriptions(SAMPLE).unwrap();
        let abi = file.addresses[0].abi().unwrap().unwrap();

        assert_eq!(abi.as_value()[0]["name"], "swap");
        assert!(file.addresses[1].abi().unwrap().is_none());
    }

    #[test]
    fn test_json_subscription_file() {
        let text = r#"[{"name": "a", "id": "0x1", "filters": [{"to": "0x1"}], "abi": [{"name": "f"}]}]"#;
        let file = parse_subscriptions(text).unwrap();

        assert!(file.global_filters.is_none());
        assert_eq!(file.addresses[0].filters, Some(vec![json!({"to": "0x1"})]));
        assert_eq!(file.addresses[0].abi().unwrap().unwrap().as_value()[0]["name"], "f");
    }

    #[test]
    fn test_invalid_abi_string() {
        let file = parse_subscriptions("- {name: a, id: '0x1', abi: 'not json'}").unwrap();
        assert!(file.addresses[0].abi().is_err());
    }

    #[test]
    fn test_malformed_file() {
        assert!(parse_subscriptions("name: [unclosed").is_err());
    }
}
