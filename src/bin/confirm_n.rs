//! Count confirmed transactions for an address, then unsubscribe
//!
//! Usage:
//!   cargo run --bin confirm_n -- [apikey-file] [count]

use anyhow::Result;
use blocknative_stream::bin_common::{client_builder_from_env, init_tracing, load_env, parse_args, run_stream, RunConfig};
use blockstream::{SubscriptionHandler, Transaction, Unsubscribe};
use serde_json::json;
use tracing::info;

const MONITOR_ADDRESS: &str = "0x7a250d5630b4cf539739df2c5dacb4c659f2488d";
const DEFAULT_REQUIRED: usize = 10;

/// Prints transactions and unsubscribes after `remaining` confirmations
struct ConfirmationCounter {
    remaining: usize,
}

impl SubscriptionHandler for ConfirmationCounter {
    fn handle(&mut self, txn: Transaction, unsubscribe: Option<Unsubscribe>) -> blockstream::Result<()> {
        println!("{}", serde_json::to_string_pretty(&txn)?);

        if txn.get("status").and_then(|s| s.as_str()) != Some("confirmed") || self.remaining == 0 {
            return Ok(());
        }

        self.remaining -= 1;
        info!(remaining = self.remaining, "Confirmed transaction");

        if self.remaining == 0 {
            if let Some(unsubscribe) = unsubscribe {
                info!(address = unsubscribe.address(), "Required confirmations reached, unsubscribing");
                unsubscribe.unsubscribe()?;
            }
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env();
    init_tracing();

    let args = parse_args();
    let required = match args.get(1) {
        Some(count) => count.parse()?,
        None => DEFAULT_REQUIRED,
    };

    let client = client_builder_from_env(args.first().map(String::as_str))?.build()?;

    client.subscribe_address(
        MONITOR_ADDRESS,
        ConfirmationCounter { remaining: required },
        Some(vec![json!({"status": "confirmed"})]),
        None,
    )?;

    run_stream(&RunConfig::new("confirm_n"), &client, None).await
}
