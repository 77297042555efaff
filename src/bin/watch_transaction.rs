//! Watch a single transaction hash
//!
//! Usage:
//!   cargo run --bin watch_transaction -- <hash> [status]
//!
//! The API key comes from BN_API_KEY or the key file. `status` defaults to
//! `confirmed`.

use anyhow::{bail, Result};
use blocknative_stream::bin_common::{client_builder_from_env, init_tracing, load_env, parse_args, run_stream, RunConfig};
use blockstream::{handler_fn, TxStatus};

#[tokio::main]
async fn main() -> Result<()> {
    load_env();
    init_tracing();

    let args = parse_args();
    let Some(hash) = args.first() else {
        bail!("usage: watch_transaction <hash> [status]");
    };
    let status: TxStatus = args.get(1).map(String::as_str).unwrap_or("confirmed").parse()?;

    let client = client_builder_from_env(None)?.build()?;

    client.subscribe_transaction(
        hash,
        handler_fn(|txn, _| {
            println!("{}", serde_json::to_string_pretty(&txn)?);
            Ok(())
        }),
        Some(status),
    )?;

    run_stream(&RunConfig::new("watch_transaction"), &client, None).await
}
