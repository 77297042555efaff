//! Watch an address and print every event for it
//!
//! Usage:
//!   cargo run --bin subscribe_address -- [apikey-file] [address]
//!
//! Without a key file the API key comes from BN_API_KEY.

use anyhow::Result;
use blocknative_stream::bin_common::{client_builder_from_env, init_tracing, load_env, parse_args, run_stream, RunConfig};
use blockstream::handler_fn;
use serde_json::json;

const MONITOR_ADDRESS: &str = "0x7a250d5630b4cf539739df2c5dacb4c659f2488d";

#[tokio::main]
async fn main() -> Result<()> {
    load_env();
    init_tracing();

    let args = parse_args();
    let address = args.get(1).map(String::as_str).unwrap_or(MONITOR_ADDRESS);

    let client = client_builder_from_env(args.first().map(String::as_str))?.build()?;

    client.subscribe_address(
        address,
        handler_fn(|txn, _| {
            println!("{}", serde_json::to_string_pretty(&txn)?);
            Ok(())
        }),
        Some(vec![json!({"network": "main"})]),
        None,
    )?;

    run_stream(&RunConfig::new("subscribe_address"), &client, None).await
}
