pub mod states;

use crate::core::client::StreamClient;
use crate::core::config::{
    StreamConfig, DEFAULT_BLOCKCHAIN, DEFAULT_ENDPOINT, DEFAULT_NETWORK_ID, MESSAGE_SEND_INTERVAL,
    PING_INTERVAL, PING_TIMEOUT,
};
use crate::protocol::payload::PayloadBuilder;
use crate::traits::error::{Result, StreamError};
use crate::traits::reconnect::{FixedDelay, ReconnectionStrategy};
use serde_json::Value;
use states::*;
use std::marker::PhantomData;
use std::time::Duration;

/// Optional settings, carried unchanged across state transitions
struct Settings {
    blockchain: String,
    network_id: u64,
    endpoint: String,
    global_filters: Option<Vec<Value>>,
    ping_interval: Duration,
    ping_timeout: Duration,
    send_interval: Duration,
    reconnect_strategy: Option<Box<dyn ReconnectionStrategy>>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            blockchain: DEFAULT_BLOCKCHAIN.to_string(),
            network_id: DEFAULT_NETWORK_ID,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            global_filters: None,
            ping_interval: PING_INTERVAL,
            ping_timeout: PING_TIMEOUT,
            send_interval: MESSAGE_SEND_INTERVAL,
            reconnect_strategy: None,
        }
    }
}

/// Type-state builder for [`StreamClient`]
///
/// ```ignore
/// let client = StreamClient::builder()
///     .api_key("my-api-key")
///     .network_id(5)
///     .global_filters(vec![json!({"status": "pending"})])
///     .build()?;
/// ```
pub struct StreamClientBuilder<K: ApiKeyState> {
    _state: PhantomData<K>,
    api_key: Option<String>,
    settings: Settings,
}

impl StreamClientBuilder<NoApiKey> {
    pub fn new() -> Self {
        Self {
            _state: PhantomData,
            api_key: None,
            settings: Settings::default(),
        }
    }

    pub fn api_key(self, api_key: impl Into<String>) -> StreamClientBuilder<HasApiKey> {
        StreamClientBuilder {
            _state: PhantomData,
            api_key: Some(api_key.into()),
            settings: self.settings,
        }
    }
}

impl Default for StreamClientBuilder<NoApiKey> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: ApiKeyState> StreamClientBuilder<K> {
    /// Blockchain system, `ethereum` by default
    pub fn blockchain(mut self, system: impl Into<String>) -> Self {
        self.settings.blockchain = system.into();
        self
    }

    /// Network id, resolved to a network name when the client is built
    pub fn network_id(mut self, network_id: u64) -> Self {
        self.settings.network_id = network_id;
        self
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.settings.endpoint = endpoint.into();
        self
    }

    /// Filters applied to the whole connection, re-sent on every reconnect
    pub fn global_filters(mut self, filters: Vec<Value>) -> Self {
        self.settings.global_filters = Some(filters);
        self
    }

    pub fn ping_interval(mut self, interval: Duration) -> Self {
        self.settings.ping_interval = interval;
        self
    }

    /// How long the heartbeat waits for a pong before dropping the session
    pub fn ping_timeout(mut self, timeout: Duration) -> Self {
        self.settings.ping_timeout = timeout;
        self
    }

    /// Pause after every dispatcher tick
    pub fn send_interval(mut self, interval: Duration) -> Self {
        self.settings.send_interval = interval;
        self
    }

    /// Defaults to [`FixedDelay::default`], retrying forever
    pub fn reconnect_strategy(mut self, strategy: impl ReconnectionStrategy + 'static) -> Self {
        self.settings.reconnect_strategy = Some(Box::new(strategy));
        self
    }
}

impl StreamClientBuilder<HasApiKey> {
    /// Validate the settings and create the client
    ///
    /// Fails with [`StreamError::UnknownNetwork`] for ids outside the
    /// network table and with [`StreamError::Configuration`] for an empty
    /// endpoint or a zero ping timeout.
    pub fn build(self) -> Result<StreamClient> {
        let api_key = self.api_key.unwrap_or_default();
        let settings = self.settings;

        if settings.endpoint.trim().is_empty() {
            return Err(StreamError::Configuration("endpoint must not be empty".into()));
        }
        if settings.ping_timeout.is_zero() {
            return Err(StreamError::Configuration("ping timeout must be greater than zero".into()));
        }

        let payloads = PayloadBuilder::new(api_key.clone(), settings.blockchain.clone(), settings.network_id)?;

        let config = StreamConfig {
            api_key,
            blockchain: settings.blockchain,
            network_id: settings.network_id,
            endpoint: settings.endpoint,
            global_filters: settings.global_filters,
            ping_interval: settings.ping_interval,
            ping_timeout: settings.ping_timeout,
            send_interval: settings.send_interval,
            reconnect_strategy: settings
                .reconnect_strategy
                .unwrap_or_else(|| Box::new(FixedDelay::default())),
        };

        Ok(StreamClient::new(config, payloads))
    }
}
