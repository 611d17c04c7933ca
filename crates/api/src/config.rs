//! Application configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use messaging::{ForwarderConfig, POISON_TOPIC, RetryPolicy, RouterConfig};

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` / `PORT`: bind address (default `0.0.0.0:3000`)
/// - `RUST_LOG`: tracing filter directive (default `"info"`)
/// - `DATABASE_URL`: PostgreSQL stores when set, in-memory stores otherwise
/// - `OUTBOX_POLL_INTERVAL_MS` / `OUTBOX_BATCH_SIZE`: forwarder polling
/// - `HANDLER_TIMEOUT_MS` / `HANDLER_MAX_ATTEMPTS`: per-message deadline and
///   deliveries before a message is poisoned
/// - `RETRY_INITIAL_BACKOFF_MS` / `RETRY_MAX_BACKOFF_MS`: redelivery backoff
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub outbox_poll_interval: Duration,
    pub outbox_batch_size: usize,
    pub handler_timeout: Duration,
    pub handler_max_attempts: u32,
    pub retry_initial_backoff: Duration,
    pub retry_max_backoff: Duration,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("HOST").unwrap_or(defaults.host),
            port: parsed("PORT").unwrap_or(defaults.port),
            log_level: std::env::var("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: std::env::var("DATABASE_URL")
                .ok()
                .filter(|url| !url.is_empty()),
            outbox_poll_interval: millis("OUTBOX_POLL_INTERVAL_MS")
                .unwrap_or(defaults.outbox_poll_interval),
            outbox_batch_size: parsed("OUTBOX_BATCH_SIZE").unwrap_or(defaults.outbox_batch_size),
            handler_timeout: millis("HANDLER_TIMEOUT_MS").unwrap_or(defaults.handler_timeout),
            handler_max_attempts: parsed("HANDLER_MAX_ATTEMPTS")
                .unwrap_or(defaults.handler_max_attempts),
            retry_initial_backoff: millis("RETRY_INITIAL_BACKOFF_MS")
                .unwrap_or(defaults.retry_initial_backoff),
            retry_max_backoff: millis("RETRY_MAX_BACKOFF_MS").unwrap_or(defaults.retry_max_backoff),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Router settings derived from the handler options.
    pub fn router_config(&self) -> RouterConfig {
        RouterConfig {
            handler_timeout: self.handler_timeout,
            retry: RetryPolicy {
                initial_backoff: self.retry_initial_backoff,
                max_backoff: self.retry_max_backoff,
                max_attempts: self.handler_max_attempts,
            },
            poison_topic: POISON_TOPIC.to_string(),
        }
    }

    /// Forwarder settings derived from the outbox options.
    pub fn forwarder_config(&self) -> ForwarderConfig {
        ForwarderConfig {
            poll_interval: self.outbox_poll_interval,
            batch_size: self.outbox_batch_size,
            ..ForwarderConfig::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            outbox_poll_interval: Duration::from_millis(100),
            outbox_batch_size: 100,
            handler_timeout: Duration::from_millis(5000),
            handler_max_attempts: 5,
            retry_initial_backoff: Duration::from_millis(50),
            retry_max_backoff: Duration::from_millis(5000),
        }
    }
}

fn parsed<T: FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

fn millis(name: &str) -> Option<Duration> {
    parsed(name).map(Duration::from_millis)
}
