//! Subscribe to every address in a subscription file
//!
//! Usage:
//!   cargo run --bin subscribe_from_config -- [subscriptions.yaml]
//!
//! The file path defaults to BN_SUBSCRIPTIONS_PATH or config/subscriptions.yaml.

use anyhow::Result;
use blocknative_stream::bin_common::{
    client_builder_from_env, init_tracing, load_config_from_env, load_env, load_subscriptions, parse_args,
    run_stream, ConfigType, RunConfig,
};
use blockstream::handler_fn;
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    load_env();
    init_tracing();

    let args = parse_args();
    let path = match args.first() {
        Some(path) => path.into(),
        None => load_config_from_env(ConfigType::Subscriptions),
    };

    let subscriptions = load_subscriptions(&path)?;
    info!(
        path = %path.display(),
        addresses = subscriptions.addresses.len(),
        global_filters = subscriptions.global_filters.is_some(),
        "Loaded subscriptions"
    );

    let mut builder = client_builder_from_env(None)?;
    if let Some(filters) = subscriptions.global_filters.clone() {
        builder = builder.global_filters(filters);
    }
    let client = builder.build()?;

    for entry in &subscriptions.addresses {
        let name = entry.name.clone();
        client.subscribe_address(
            &entry.id,
            handler_fn(move |txn, _| {
                println!("[{}] {}", name, serde_json::to_string(&txn)?);
                Ok(())
            }),
            entry.filters.clone(),
            entry.abi()?,
        )?;
    }

    let config = RunConfig::new("subscribe_from_config").with_status_interval(Duration::from_secs(60));
    run_stream(&config, &client, None).await
}
