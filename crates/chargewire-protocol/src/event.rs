use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::{
    OffsetDateTime, PrimitiveDateTime,
    format_description::well_known::{Iso8601, Rfc3339},
};

use crate::EventKind;

/// Canonical record produced from one push-channel frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Server-assigned id; empty when the frame carried none.
    pub id: String,
    /// ISO-8601 instant: server time when present, capture time otherwise.
    pub timestamp: String,
    /// Normalized event type.
    #[serde(rename = "event_type")]
    pub kind: EventKind,
    /// Station the event concerns; empty for global events.
    pub station_id: String,
    /// Event-specific fields, passed through untyped.
    pub payload: Map<String, Value>,
}

impl Event {
    /// Build an event stamped with the current time and an empty payload.
    pub fn new(kind: EventKind, station_id: impl Into<String>) -> Self {
        let timestamp = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default();
        Self {
            id: String::new(),
            timestamp,
            kind,
            station_id: station_id.into(),
            payload: Map::new(),
        }
    }

    /// Add one payload field.
    pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.payload.insert(key.to_string(), value.into());
        self
    }

    /// Raw payload field.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    /// Payload field rendered as text: strings unquoted, numbers and booleans
    /// in their JSON form. Null, empty strings and nested values yield `None`.
    pub fn field_text(&self, key: &str) -> Option<String> {
        value_text(self.payload.get(key)?)
    }

    /// First of `keys` that renders as text.
    pub fn first_text(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|k| self.field_text(k))
    }

    /// Transaction id from the payload, if any.
    pub fn transaction_id(&self) -> Option<String> {
        self.first_text(&["transaction_id", "transactionId"])
    }

    /// Connector id from the payload, if any.
    pub fn connector_id(&self) -> Option<String> {
        self.first_text(&["connector_id", "connectorId"])
    }

    /// Parsed [`Event::timestamp`].
    pub fn occurred_at(&self) -> Option<OffsetDateTime> {
        parse_instant(&self.timestamp)
    }
}

/// Render a scalar JSON value as text.
pub(crate) fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Parse an ISO-8601 instant.
///
/// Accepts RFC 3339, ISO-8601 with an offset, and ISO-8601 without an offset
/// (taken as UTC).
pub fn parse_instant(s: &str) -> Option<OffsetDateTime> {
    let s = s.trim();
    OffsetDateTime::parse(s, &Rfc3339)
        .or_else(|_| OffsetDateTime::parse(s, &Iso8601::DEFAULT))
        .ok()
        .or_else(|| {
            PrimitiveDateTime::parse(s, &Iso8601::DEFAULT)
                .ok()
                .map(PrimitiveDateTime::assume_utc)
        })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_common_instant_forms() {
        assert!(parse_instant("2024-05-01T10:15:30Z").is_some());
        assert!(parse_instant("2024-05-01T10:15:30.123+05:00").is_some());
        assert!(parse_instant("2024-05-01T10:15:30.123456").is_some());
        assert!(parse_instant("yesterday").is_none());
        assert!(parse_instant("").is_none());
    }

    #[test]
    fn field_text_renders_scalars_only() {
        let ev = Event::new(EventKind::MeterValues, "CP1")
            .with_field("transaction_id", 55)
            .with_field("status", "Charging")
            .with_field("blank", "  ")
            .with_field("nested", json!({"a": 1}))
            .with_field("none", Value::Null);
        assert_eq!(ev.transaction_id().as_deref(), Some("55"));
        assert_eq!(ev.field_text("status").as_deref(), Some("Charging"));
        assert_eq!(ev.field_text("blank"), None);
        assert_eq!(ev.field_text("nested"), None);
        assert_eq!(ev.field_text("none"), None);
        assert_eq!(ev.field_text("missing"), None);
    }

    #[test]
    fn new_events_carry_a_parseable_timestamp() {
        let ev = Event::new(EventKind::HeartbeatReceived, "");
        assert!(ev.occurred_at().is_some());
        assert!(ev.id.is_empty());
    }
}
