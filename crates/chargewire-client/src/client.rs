use std::{sync::Arc, time::Duration};

use chargewire_engine::{
    Backoff, CacheSink, DEFAULT_FEED_CAPACITY, DEFAULT_MAX_ATTEMPTS, Dispatcher,
    NotificationDispatcher, Reconnector, StatusStore, Strategy,
};
use chargewire_protocol::{
    Subscription,
    ui::{UiRx, ui_channel},
};
use tracing::debug;
use url::Url;

use crate::{
    Error, Result,
    driver::{Connector, WsConnector},
    session::{self, SessionHandle},
};

/// Builder for a push-channel session.
///
/// ```no_run
/// # async fn run() -> chargewire_client::Result<()> {
/// let (session, mut ui) = chargewire_client::Client::new("ws://localhost:8080/ws")?.connect()?;
/// while let Some(msg) = ui.recv().await {
///     println!("{msg:?}");
/// }
/// session.shutdown().await
/// # }
/// ```
pub struct Client {
    /// Base push-channel URL.
    url: Url,
    /// Station and kind scope, sent as query parameters.
    subscription: Subscription,
    /// Retry delay schedule.
    backoff: Backoff,
    /// Automatic retries before giving up.
    max_attempts: u32,
    /// Live feed size.
    feed_capacity: usize,
    /// Opens sockets.
    connector: Arc<dyn Connector>,
    /// Cache sink; the UI channel when unset.
    cache: Option<Arc<dyn CacheSink>>,
}

/// Parse a push-channel URL, accepting only `ws` and `wss`.
pub fn parse_ws_url(url: &str) -> Result<Url> {
    let url = Url::parse(url)?;
    match url.scheme() {
        "ws" | "wss" => Ok(url),
        other => Err(Error::Scheme(other.to_string())),
    }
}

impl Client {
    /// Create a client for `url` with default reconnect settings.
    pub fn new(url: &str) -> Result<Self> {
        Ok(Self {
            url: parse_ws_url(url)?,
            subscription: Subscription::all(),
            backoff: Backoff::default(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            feed_capacity: DEFAULT_FEED_CAPACITY,
            connector: Arc::new(WsConnector),
            cache: None,
        })
    }

    /// Create a client from loaded configuration.
    pub fn from_config(cfg: &config::Config) -> Result<Self> {
        let strategy = match cfg.reconnect.strategy {
            config::BackoffStrategy::Fixed => Strategy::Fixed,
            config::BackoffStrategy::Exponential => Strategy::Exponential,
        };
        Ok(Self::new(&cfg.ws_url)?
            .with_backoff(Backoff {
                strategy,
                base: Duration::from_millis(cfg.reconnect.base_interval_ms),
                ceiling: Duration::from_millis(cfg.reconnect.ceiling_ms),
            })
            .with_max_attempts(cfg.reconnect.max_attempts)
            .with_feed_capacity(cfg.feed_capacity)
            .with_subscription(cfg.subscription.clone()))
    }

    /// Scope the push channel to a station and/or a set of kinds.
    pub fn with_subscription(mut self, subscription: Subscription) -> Self {
        self.subscription = subscription;
        self
    }

    /// Set the retry delay schedule.
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Set the number of automatic retries before the session stops.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the live feed size.
    pub fn with_feed_capacity(mut self, capacity: usize) -> Self {
        self.feed_capacity = capacity;
        self
    }

    /// Replace the socket connector.
    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = connector;
        self
    }

    /// Send invalidations to `cache` instead of the UI channel.
    pub fn with_cache_sink(mut self, cache: Arc<dyn CacheSink>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Full URL the session connects to, subscription parameters included.
    pub fn url(&self) -> Url {
        self.subscription.apply_to(&self.url)
    }

    /// Spawn an idle session on the current tokio runtime.
    ///
    /// Returns the session handle and the receiver for invalidations and
    /// notifications. Call [`SessionHandle::enable`] to connect.
    pub fn spawn(self) -> (SessionHandle, UiRx) {
        let (tx, rx) = ui_channel();
        let url = self.url();
        let cache: Arc<dyn CacheSink> = match self.cache {
            Some(cache) => cache,
            None => Arc::new(tx.clone()),
        };
        let dispatcher = Dispatcher::new(
            StatusStore::new(self.feed_capacity),
            cache,
            NotificationDispatcher::new(tx),
        );
        debug!(
            url = %url,
            max_attempts = self.max_attempts,
            base_ms = self.backoff.base.as_millis() as u64,
            "spawning session"
        );
        let policy = Reconnector::new(self.backoff, self.max_attempts);
        let handle = session::spawn(url, policy, self.connector, dispatcher);
        (handle, rx)
    }

    /// Spawn a session and enable it.
    pub fn connect(self) -> Result<(SessionHandle, UiRx)> {
        let (handle, rx) = self.spawn();
        handle.enable()?;
        Ok((handle, rx))
    }
}

#[cfg(test)]
mod tests {
    use chargewire_protocol::EventKind;

    use super::*;

    #[test]
    fn rejects_non_websocket_urls() {
        assert!(matches!(
            Client::new("http://localhost/ws"),
            Err(Error::Scheme(s)) if s == "http"
        ));
        assert!(matches!(Client::new("not a url"), Err(Error::Url(_))));
        assert!(Client::new("wss://backend.example/ws").is_ok());
    }

    #[test]
    fn subscription_is_applied_to_url() {
        let client = Client::new("ws://localhost:8080/api/v1/notifications/ws")
            .unwrap()
            .with_subscription(
                Subscription::station("CP1").with_kinds([EventKind::HeartbeatReceived]),
            );
        assert_eq!(
            client.url().as_str(),
            "ws://localhost:8080/api/v1/notifications/ws?charge_point_id=CP1&event_types=heartbeat_received"
        );
    }

    #[test]
    fn from_config_carries_reconnect_settings() {
        let mut cfg = config::Config::default();
        cfg.reconnect.strategy = config::BackoffStrategy::Fixed;
        cfg.reconnect.base_interval_ms = 250;
        cfg.reconnect.max_attempts = 3;
        let client = Client::from_config(&cfg).unwrap();
        assert_eq!(client.backoff.strategy, Strategy::Fixed);
        assert_eq!(client.backoff.base, Duration::from_millis(250));
        assert_eq!(client.max_attempts, 3);
        assert_eq!(client.feed_capacity, 100);
    }
}
