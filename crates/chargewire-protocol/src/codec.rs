//! Decoding of raw push-channel frames into canonical events.
//!
//! The backend is not consistent about envelope shape: the type marker may
//! arrive as `type`, `event_type`, `eventType` or `event`, in PascalCase or
//! snake_case, and the station id may sit at the top level or inside the
//! payload. [`decode_frame`] accepts all of these and produces one
//! [`Event`] shape; [`normalize`] is the lossy convenience that drops every
//! frame that is not an event.

use serde_json::{Map, Value};
use thiserror::Error;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::{
    Event, EventKind,
    event::{parse_instant, value_text},
    kind::to_snake_case,
};

/// Reserved marker of the connection-acknowledgement control frame.
pub const ACK_MARKER: &str = "connection_established";

/// Envelope keys that may carry the type marker, in priority order.
const TYPE_KEYS: &[&str] = &["type", "event_type", "eventType", "event"];
/// Envelope keys that may carry the payload.
const PAYLOAD_KEYS: &[&str] = &["data", "payload"];
/// Keys that may carry the station id, top level first, then inside the payload.
const STATION_KEYS: &[&str] = &["station_id", "stationId", "charge_point_id", "chargePointId"];
/// Envelope keys that may carry the server timestamp.
const TIMESTAMP_KEYS: &[&str] = &["timestamp", "ts"];
/// Envelope keys that may carry the event id.
const ID_KEYS: &[&str] = &["id", "event_id", "eventId"];

/// Errors from decoding a push-channel frame.
#[derive(Debug, Error)]
pub enum Error {
    /// The frame is not valid JSON.
    #[error("invalid JSON frame: {0}")]
    Json(#[from] serde_json::Error),
    /// The frame parsed, but is not a JSON object.
    #[error("frame is not a JSON object")]
    NotAnObject,
    /// No usable type marker was found.
    #[error("frame has no type marker")]
    MissingType,
    /// The frame carried a timestamp that is not an ISO-8601 instant.
    #[error("unparseable timestamp: {0}")]
    Timestamp(String),
    /// Formatting the capture time failed.
    #[error("failed to format capture time: {0}")]
    Clock(#[from] time::error::Format),
}

/// A successfully decoded frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// The once-per-socket connection acknowledgement.
    Ack,
    /// A canonical event.
    Event(Event),
}

/// Decode a raw text frame, stamping missing timestamps with the current time.
pub fn decode_frame(raw: &str) -> Result<Frame, Error> {
    decode_frame_at(raw, OffsetDateTime::now_utc())
}

/// Decode a raw text frame, stamping missing timestamps with `now`.
pub fn decode_frame_at(raw: &str, now: OffsetDateTime) -> Result<Frame, Error> {
    let Value::Object(mut envelope) = serde_json::from_str::<Value>(raw)? else {
        return Err(Error::NotAnObject);
    };

    let marker = TYPE_KEYS
        .iter()
        .find_map(|k| envelope.get(*k).and_then(Value::as_str))
        .map(to_snake_case)
        .filter(|m| !m.is_empty())
        .ok_or(Error::MissingType)?;
    if marker == ACK_MARKER {
        return Ok(Frame::Ack);
    }

    let payload = take_payload(&mut envelope);
    let station_id = first_text(&envelope, STATION_KEYS)
        .or_else(|| first_text(&payload, STATION_KEYS))
        .unwrap_or_default();
    let timestamp = match TIMESTAMP_KEYS.iter().find_map(|k| envelope.get(*k)) {
        Some(v) => timestamp_text(v)?,
        None => now.format(&Rfc3339)?,
    };
    let id = first_text(&envelope, ID_KEYS).unwrap_or_default();

    Ok(Frame::Event(Event {
        id,
        timestamp,
        kind: EventKind::from_snake(marker),
        station_id,
        payload,
    }))
}

/// Decode a raw frame into an event, or `None` for acknowledgements and
/// anything malformed.
pub fn normalize(raw: &str) -> Option<Event> {
    match decode_frame(raw) {
        Ok(Frame::Event(event)) => Some(event),
        Ok(Frame::Ack) | Err(_) => None,
    }
}

/// Remove the payload from the envelope. Non-object payloads are wrapped as
/// `{"value": ...}`.
fn take_payload(envelope: &mut Map<String, Value>) -> Map<String, Value> {
    let Some(value) = PAYLOAD_KEYS.iter().find_map(|k| envelope.remove(*k)) else {
        return Map::new();
    };
    match value {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("value".to_string(), other);
            map
        }
    }
}

/// First of `keys` in `map` that renders as text.
fn first_text(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| map.get(*k).and_then(value_text))
}

/// Canonical timestamp text for a server-supplied value: ISO-8601 strings are
/// kept as sent, integer epoch milliseconds are converted to RFC 3339.
fn timestamp_text(value: &Value) -> Result<String, Error> {
    match value {
        Value::String(s) if parse_instant(s).is_some() => Ok(s.clone()),
        Value::Number(n) => {
            let millis = n.as_i64().ok_or_else(|| Error::Timestamp(n.to_string()))?;
            let instant = OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
                .map_err(|_| Error::Timestamp(n.to_string()))?;
            Ok(instant.format(&Rfc3339)?)
        }
        other => Err(Error::Timestamp(other.to_string())),
    }
}
