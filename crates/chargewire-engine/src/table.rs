//! Cache invalidation table: which cached read-models go stale for each event
//! kind.
//!
//! This is the only place event kinds are wired to cache keys. Adding a kind
//! means adding a row to [`patterns_for`]; the dispatcher never changes.

use chargewire_protocol::{Event, EventKind};

use crate::cache::CacheKey;

/// Placeholder replaced by the event's station id.
const STATION_PARAM: &str = "{stationId}";
/// Placeholder replaced by the payload's transaction id.
const TRANSACTION_PARAM: &str = "{transactionId}";

/// A cache-key template such as `stations:list` or `station:{stationId}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPattern(&'static str);

impl KeyPattern {
    /// Create a pattern from a template.
    pub const fn new(template: &'static str) -> Self {
        Self(template)
    }

    /// The raw template.
    pub fn template(&self) -> &'static str {
        self.0
    }

    /// Fill the template from `event`. Returns `None` when a placeholder has
    /// no value: a global event has no `station:{stationId}` key, and a meter
    /// reading without a transaction id has no `transaction:{transactionId}`.
    pub fn resolve(&self, event: &Event) -> Option<CacheKey> {
        let mut key = self.0.to_string();
        if key.contains(STATION_PARAM) {
            if event.station_id.is_empty() {
                return None;
            }
            key = key.replace(STATION_PARAM, &event.station_id);
        }
        if key.contains(TRANSACTION_PARAM) {
            let tx = event.transaction_id()?;
            key = key.replace(TRANSACTION_PARAM, &tx);
        }
        Some(CacheKey::new(key))
    }
}

const STATIONS_LIST: KeyPattern = KeyPattern::new("stations:list");
const STATION: KeyPattern = KeyPattern::new("station:{stationId}");
const STATION_CONNECTORS: KeyPattern = KeyPattern::new("station:{stationId}:connectors");
const STATION_ACTIVE_TRANSACTIONS: KeyPattern =
    KeyPattern::new("station:{stationId}:active-transactions");
const TRANSACTIONS_ALL: KeyPattern = KeyPattern::new("transactions:all");
const TRANSACTION: KeyPattern = KeyPattern::new("transaction:{transactionId}");
const MONITORING_ALL: KeyPattern = KeyPattern::new("monitoring:all");
const MONITORING_STATS: KeyPattern = KeyPattern::new("monitoring:stats");
const MONITORING_HEARTBEATS: KeyPattern = KeyPattern::new("monitoring:heartbeats");

/// Station presence and status rows.
const STATION_PRESENCE: &[KeyPattern] = &[STATIONS_LIST, MONITORING_ALL];
/// Transaction lifecycle rows.
const TRANSACTION_LIFECYCLE: &[KeyPattern] = &[
    TRANSACTIONS_ALL,
    STATION,
    STATION_CONNECTORS,
    MONITORING_STATS,
];

/// Key patterns invalidated by events of `kind`.
pub fn patterns_for(kind: &EventKind) -> &'static [KeyPattern] {
    match kind {
        EventKind::StationConnected
        | EventKind::StationDisconnected
        | EventKind::StationStatusChanged => STATION_PRESENCE,
        EventKind::BootNotification => &[STATIONS_LIST],
        EventKind::HeartbeatReceived => &[STATION, MONITORING_HEARTBEATS],
        EventKind::ConnectorStatusChanged => &[STATION, STATION_CONNECTORS, STATIONS_LIST],
        EventKind::TransactionStarted | EventKind::TransactionStopped => TRANSACTION_LIFECYCLE,
        EventKind::MeterValues => &[TRANSACTION, STATION_ACTIVE_TRANSACTIONS],
        EventKind::AuthorizationResult | EventKind::Error | EventKind::Other(_) => &[],
    }
}

/// Concrete keys to invalidate for `event`, without duplicates, in table order.
pub fn keys_for(event: &Event) -> Vec<CacheKey> {
    let mut keys: Vec<CacheKey> = Vec::new();
    for key in patterns_for(&event.kind)
        .iter()
        .filter_map(|p| p.resolve(event))
    {
        if !keys.contains(&key) {
            keys.push(key);
        }
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(event: &Event) -> Vec<String> {
        keys_for(event).iter().map(ToString::to_string).collect()
    }

    #[test]
    fn transaction_stopped_invalidates_exactly_its_rows() {
        let ev = Event::new(EventKind::TransactionStopped, "CP1").with_field("transaction_id", 9);
        assert_eq!(
            keys(&ev),
            [
                "transactions:all",
                "station:CP1",
                "station:CP1:connectors",
                "monitoring:stats"
            ]
        );
    }

    #[test]
    fn station_presence_rows() {
        for kind in [
            EventKind::StationConnected,
            EventKind::StationDisconnected,
            EventKind::StationStatusChanged,
        ] {
            assert_eq!(
                keys(&Event::new(kind, "CP1")),
                ["stations:list", "monitoring:all"]
            );
        }
        assert_eq!(
            keys(&Event::new(EventKind::BootNotification, "CP1")),
            ["stations:list"]
        );
    }

    #[test]
    fn heartbeat_and_connector_rows() {
        assert_eq!(
            keys(&Event::new(EventKind::HeartbeatReceived, "CP2")),
            ["station:CP2", "monitoring:heartbeats"]
        );
        assert_eq!(
            keys(&Event::new(EventKind::ConnectorStatusChanged, "CP2")),
            ["station:CP2", "station:CP2:connectors", "stations:list"]
        );
    }

    #[test]
    fn meter_values_needs_transaction_id_for_detail_key() {
        let with_tx = Event::new(EventKind::MeterValues, "CP3").with_field("transaction_id", 55);
        assert_eq!(
            keys(&with_tx),
            ["transaction:55", "station:CP3:active-transactions"]
        );
        let without_tx = Event::new(EventKind::MeterValues, "CP3");
        assert_eq!(keys(&without_tx), ["station:CP3:active-transactions"]);
    }

    #[test]
    fn informational_kinds_invalidate_nothing() {
        for kind in [
            EventKind::AuthorizationResult,
            EventKind::Error,
            EventKind::Other("firmware_status_notification".into()),
        ] {
            assert!(keys(&Event::new(kind, "CP1")).is_empty());
        }
    }

    #[test]
    fn station_keys_are_skipped_for_global_events() {
        assert_eq!(
            keys(&Event::new(EventKind::HeartbeatReceived, "")),
            ["monitoring:heartbeats"]
        );
    }

    #[test]
    fn every_pattern_uses_known_placeholders() {
        for kind in EventKind::KNOWN {
            for pattern in patterns_for(&kind) {
                let stripped = pattern
                    .template()
                    .replace(STATION_PARAM, "")
                    .replace(TRANSACTION_PARAM, "");
                assert!(!stripped.contains('{'), "{}", pattern.template());
            }
        }
    }
}
