use chargewire_protocol::Subscription;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::Error;

/// Default push-channel endpoint.
pub const DEFAULT_WS_URL: &str = "ws://localhost:8080/api/v1/notifications/ws";
/// Default delay before the first retry, in milliseconds.
pub const DEFAULT_BASE_INTERVAL_MS: u64 = 1000;
/// Default upper bound on any retry delay, in milliseconds.
pub const DEFAULT_CEILING_MS: u64 = 30_000;
/// Default number of automatic retries.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;
/// Default live feed size.
pub const DEFAULT_FEED_CAPACITY: usize = 100;

/// How retry delays grow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    /// Always the base interval.
    Fixed,
    /// Doubling from the base interval up to the ceiling.
    #[default]
    Exponential,
}

impl BackoffStrategy {
    /// Parse `fixed` or `exponential`, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fixed" => Some(Self::Fixed),
            "exponential" => Some(Self::Exponential),
            _ => None,
        }
    }
}

/// Reconnection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Reconnect {
    /// Delay growth rule.
    pub strategy: BackoffStrategy,
    /// Delay before the first retry, in milliseconds.
    pub base_interval_ms: u64,
    /// Upper bound on exponential retry delays, in milliseconds.
    pub ceiling_ms: u64,
    /// Automatic retries before the session stops.
    pub max_attempts: u32,
}

impl Default for Reconnect {
    fn default() -> Self {
        Self {
            strategy: BackoffStrategy::default(),
            base_interval_ms: DEFAULT_BASE_INTERVAL_MS,
            ceiling_ms: DEFAULT_CEILING_MS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Startup configuration, read once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Push-channel base URL (`ws://` or `wss://`).
    pub ws_url: String,
    /// Reconnection settings.
    pub reconnect: Reconnect,
    /// Number of events kept in the live feed.
    pub feed_capacity: usize,
    /// Station and kind scope of the subscription.
    pub subscription: Subscription,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ws_url: DEFAULT_WS_URL.to_string(),
            reconnect: Reconnect::default(),
            feed_capacity: DEFAULT_FEED_CAPACITY,
            subscription: Subscription::default(),
        }
    }
}

impl Config {
    /// Check every setting, returning the first problem found.
    pub fn validate(&self) -> Result<(), Error> {
        let url = Url::parse(&self.ws_url)
            .map_err(|e| Error::invalid("ws_url", format!("'{}' is not a URL: {}", self.ws_url, e)))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(Error::invalid(
                "ws_url",
                format!("scheme must be ws or wss, got '{}'", url.scheme()),
            ));
        }
        if self.reconnect.base_interval_ms == 0 {
            return Err(Error::invalid(
                "reconnect.base_interval_ms",
                "must be greater than zero",
            ));
        }
        if self.reconnect.strategy == BackoffStrategy::Exponential
            && self.reconnect.ceiling_ms < self.reconnect.base_interval_ms
        {
            return Err(Error::invalid(
                "reconnect.ceiling_ms",
                format!(
                    "must be at least base_interval_ms ({})",
                    self.reconnect.base_interval_ms
                ),
            ));
        }
        if self.feed_capacity == 0 {
            return Err(Error::invalid("feed_capacity", "must be at least 1"));
        }
        Ok(())
    }
}
