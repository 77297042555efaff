use crate::traits::reconnect::ReconnectionStrategy;
use serde_json::Value;
use std::fmt;
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "wss://api.blocknative.com/v0";
pub const DEFAULT_BLOCKCHAIN: &str = "ethereum";
pub const DEFAULT_NETWORK_ID: u64 = 1;

pub const PING_INTERVAL: Duration = Duration::from_secs(15);
pub const PING_TIMEOUT: Duration = Duration::from_secs(10);
/// Keeps outbound traffic under the server's ~50 messages/s ceiling
pub const MESSAGE_SEND_INTERVAL: Duration = Duration::from_millis(21);

/// Stream client configuration
///
/// Assembled by [`StreamClientBuilder`](crate::core::builder::StreamClientBuilder).
pub struct StreamConfig {
    pub api_key: String,
    pub blockchain: String,
    pub network_id: u64,
    pub endpoint: String,
    pub global_filters: Option<Vec<Value>>,
    pub ping_interval: Duration,
    pub ping_timeout: Duration,
    pub send_interval: Duration,
    pub reconnect_strategy: Box<dyn ReconnectionStrategy>,
}

impl StreamConfig {
    pub fn has_global_filters(&self) -> bool {
        self.global_filters.is_some()
    }
}

impl fmt::Debug for StreamConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamConfig")
            .field("api_key", &"<redacted>")
            .field("blockchain", &self.blockchain)
            .field("network_id", &self.network_id)
            .field("endpoint", &self.endpoint)
            .field("global_filters", &self.global_filters)
            .field("ping_interval", &self.ping_interval)
            .field("ping_timeout", &self.ping_timeout)
            .field("send_interval", &self.send_interval)
            .finish_non_exhaustive()
    }
}
