//! CLI utilities for binaries
//!
//! Handles config file paths, the API key and environment variables
//! for all binary executables.

use anyhow::{bail, Context, Result};
use blockstream::{states::HasApiKey, StreamClient, StreamClientBuilder};
use std::path::{Path, PathBuf};

/// Environment variable holding the API key itself
pub const API_KEY_ENV: &str = "BN_API_KEY";
pub const ENDPOINT_ENV: &str = "BN_ENDPOINT";
pub const NETWORK_ID_ENV: &str = "BN_NETWORK_ID";

/// Type of configuration to load
#[derive(Debug, Clone)]
pub enum ConfigType {
    /// Subscription file (config/subscriptions.yaml)
    Subscriptions,
    /// File whose first line is the API key
    ApiKey,
    /// Custom path
    Custom(String),
}

impl ConfigType {
    /// Get the default path for this config type
    pub fn default_path(&self) -> &str {
        match self {
            ConfigType::Subscriptions => "config/subscriptions.yaml",
            ConfigType::ApiKey => "apikey.txt",
            ConfigType::Custom(path) => path,
        }
    }

    /// Get the environment variable name for this config type
    pub fn env_var_name(&self) -> &str {
        match self {
            ConfigType::Subscriptions => "BN_SUBSCRIPTIONS_PATH",
            ConfigType::ApiKey => "BN_API_KEY_PATH",
            ConfigType::Custom(_) => "BN_CONFIG_PATH",
        }
    }
}

/// Load configuration path from environment or use default
///
/// # Examples
/// ```
/// use blocknative_stream::bin_common::{load_config_from_env, ConfigType};
///
/// let path = load_config_from_env(ConfigType::Subscriptions);
/// ```
pub fn load_config_from_env(config_type: ConfigType) -> PathBuf {
    std::env::var(config_type.env_var_name())
        .unwrap_or_else(|_| config_type.default_path().to_string())
        .into()
}

/// Parse command line arguments for a binary
///
/// Returns a vector of arguments (excluding the program name)
pub fn parse_args() -> Vec<String> {
    std::env::args().skip(1).collect()
}

/// Load a `.env` file if there is one
pub fn load_env() {
    dotenv::dotenv().ok();
}

/// Read an API key file: the first line, trimmed
pub fn read_api_key(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read API key file {}", path.display()))?;

    let key = contents.lines().next().unwrap_or_default().trim();
    if key.is_empty() {
        bail!("API key file {} is empty", path.display());
    }
    Ok(key.to_string())
}

/// API key from `BN_API_KEY`, else from the key file (`BN_API_KEY_PATH` or `apikey.txt`)
pub fn api_key_from_env() -> Result<String> {
    match std::env::var(API_KEY_ENV) {
        Ok(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
        _ => read_api_key(load_config_from_env(ConfigType::ApiKey))
            .with_context(|| format!("{} is not set", API_KEY_ENV)),
    }
}

/// Endpoint override from `BN_ENDPOINT`
pub fn endpoint_from_env() -> Option<String> {
    std::env::var(ENDPOINT_ENV).ok().filter(|url| !url.is_empty())
}

/// Network id from `BN_NETWORK_ID`
pub fn network_id_from_env() -> Result<Option<u64>> {
    match std::env::var(NETWORK_ID_ENV) {
        Ok(value) => {
            let id = value
                .trim()
                .parse()
                .with_context(|| format!("{}={} is not a network id", NETWORK_ID_ENV, value))?;
            Ok(Some(id))
        }
        Err(_) => Ok(None),
    }
}

/// Client builder with the API key and environment overrides applied
///
/// `key_file` takes precedence over `BN_API_KEY`.
pub fn client_builder_from_env(key_file: Option<&str>) -> Result<StreamClientBuilder<HasApiKey>> {
    let api_key = match key_file {
        Some(path) => read_api_key(path)?,
        None => api_key_from_env()?,
    };

    let mut builder = StreamClient::builder().api_key(api_key);
    if let Some(network_id) = network_id_from_env()? {
        builder = builder.network_id(network_id);
    }
    if let Some(endpoint) = endpoint_from_env() {
        builder = builder.endpoint(endpoint);
    }
    Ok(builder)
}
