//! Integration test: Configuration utilities
//!
//! Tests the bin_common configuration loading functionality.

use blocknative_stream::bin_common::{load_config_from_env, load_subscriptions, ConfigType};
use std::env;

#[test]
fn test_subscriptions_config_default() {
    // Clear env var to test default
    env::remove_var("BN_SUBSCRIPTIONS_PATH");

    let config_path = load_config_from_env(ConfigType::Subscriptions);
    assert_eq!(config_path.to_str().unwrap(), "config/subscriptions.yaml");
}

#[test]
fn test_api_key_path_from_env() {
    env::set_var("BN_API_KEY_PATH", "/tmp/bn-key.txt");

    let config_path = load_config_from_env(ConfigType::ApiKey);
    assert_eq!(config_path.to_str().unwrap(), "/tmp/bn-key.txt");

    env::remove_var("BN_API_KEY_PATH");
}

#[test]
fn test_custom_config() {
    env::remove_var("BN_CONFIG_PATH");

    let custom = ConfigType::Custom("custom/path.yaml".to_string());
    let config_path = load_config_from_env(custom);

    assert_eq!(config_path.to_str().unwrap(), "custom/path.yaml");
}

#[test]
fn test_bundled_subscription_file_loads() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/subscriptions.yaml");
    let subscriptions = load_subscriptions(path).unwrap();

    assert!(subscriptions.global_filters.is_some());
    assert_eq!(subscriptions.addresses.len(), 1);

    let router = &subscriptions.addresses[0];
    assert_eq!(router.id, "0x7a250d5630b4cf539739df2c5dacb4c659f2488d");
    let abi = router.abi().unwrap().unwrap();
    assert_eq!(abi.as_value()[0]["name"], "swapExactTokensForTokens");
}

#[test]
fn test_missing_subscription_file() {
    assert!(load_subscriptions("/nonexistent/subscriptions.yaml").is_err());
}
