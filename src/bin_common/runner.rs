//! Binary runner utilities
//!
//! Provides a standardized way to run a stream client with a startup banner,
//! periodic status logging and Ctrl+C shutdown.

use blockstream::{Metrics, StreamClient};
use std::time::Duration;
use tracing::info;

/// Configuration for running a binary application
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Name of the binary (for logging)
    pub name: String,
    /// How often client metrics are logged
    pub status_interval: Duration,
}

impl RunConfig {
    /// Create a new run configuration
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status_interval: Duration::from_secs(300), // 5 minutes default
        }
    }

    /// Set status log interval
    pub fn with_status_interval(mut self, interval: Duration) -> Self {
        self.status_interval = interval;
        self
    }
}

fn print_banner(config: &RunConfig) {
    info!("");
    info!("========================================");
    info!("Starting {}", config.name);
    info!("Press Ctrl+C to stop");
    info!("========================================");
    info!("");
}

fn print_shutdown(config: &RunConfig, metrics: &Metrics) {
    info!("");
    info!("========================================");
    info!("{} stopped", config.name);
    info!("{}", format_status(metrics));
    info!("========================================");
}

fn format_since(elapsed: Option<Duration>) -> String {
    match elapsed {
        Some(elapsed) => format!("{}ms", elapsed.as_millis()),
        None => "never".to_string(),
    }
}

/// One-line summary of client metrics
pub fn format_status(metrics: &Metrics) -> String {
    format!(
        "state={:?} subscriptions={} sent={} delivered={} dropped={} reconnects={} queued={} last_ping={} last_pong={} heartbeat={}",
        metrics.session_state,
        metrics.subscriptions,
        metrics.messages_sent,
        metrics.events_delivered,
        metrics.events_dropped,
        metrics.reconnect_count,
        metrics.queued_messages,
        format_since(metrics.since_last_ping),
        format_since(metrics.since_last_pong),
        if metrics.heartbeat_healthy { "ok" } else { "late" },
    )
}

/// Connect `client` and run it until shutdown or a fatal error
///
/// Ctrl+C calls [`StreamClient::shutdown`], after which this returns `Ok(())`.
pub async fn run_stream(config: &RunConfig, client: &StreamClient, endpoint: Option<&str>) -> anyhow::Result<()> {
    print_banner(config);

    let signal_client = client.clone();
    let signal = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl+C received");
            signal_client.shutdown();
        }
    });

    let connect = client.connect(endpoint);
    tokio::pin!(connect);

    let mut status = tokio::time::interval(config.status_interval);
    status.tick().await;

    let result = loop {
        tokio::select! {
            result = &mut connect => break result,
            _ = status.tick() => info!("[{}] {}", config.name, format_status(&client.metrics())),
        }
    };

    signal.abort();
    print_shutdown(config, &client.metrics());
    Ok(result?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockstream::StreamError;

    #[test]
    fn test_run_config_builder() {
        let config = RunConfig::new("test-binary").with_status_interval(Duration::from_secs(120));

        assert_eq!(config.name, "test-binary");
        assert_eq!(config.status_interval, Duration::from_secs(120));
    }

    #[test]
    fn test_default_config() {
        let config = RunConfig::new("default");
        assert_eq!(config.status_interval, Duration::from_secs(300));
    }

    #[test]
    fn test_format_status() {
        let client = StreamClient::builder().api_key("test-key").build().unwrap();
        let status = format_status(&client.metrics());

        assert!(status.starts_with("state=Disconnected"));
        assert!(status.contains("subscriptions=0"));
        assert!(status.contains("last_ping=never"));
        assert!(status.ends_with("heartbeat=ok"));
    }

    #[tokio::test]
    async fn test_run_stream_surfaces_client_error() {
        let client = StreamClient::builder().api_key("test-key").build().unwrap();
        client.shutdown();

        let err = run_stream(&RunConfig::new("test"), &client, None).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<StreamError>(), Some(StreamError::Shutdown)));
    }
}
