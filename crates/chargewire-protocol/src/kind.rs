//! Canonical event kinds and wire-marker normalization.

use std::{convert::Infallible, fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Canonical event type carried by every [`crate::Event`].
///
/// Markers that are not part of the known set are kept verbatim (in
/// snake_case) as [`EventKind::Other`] so they still reach the live feed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A station opened its link to the backend.
    StationConnected,
    /// A station's link dropped.
    StationDisconnected,
    /// A station reported a new overall status.
    StationStatusChanged,
    /// A station booted and registered.
    BootNotification,
    /// A station heartbeat arrived.
    HeartbeatReceived,
    /// One connector changed status.
    ConnectorStatusChanged,
    /// A charging transaction started.
    TransactionStarted,
    /// A charging transaction stopped.
    TransactionStopped,
    /// Meter readings arrived.
    MeterValues,
    /// An authorization request was answered.
    AuthorizationResult,
    /// The backend reported an error.
    Error,
    /// A marker outside the known set.
    Other(String),
}

impl EventKind {
    /// Every known kind, in declaration order.
    pub const KNOWN: [Self; 11] = [
        Self::StationConnected,
        Self::StationDisconnected,
        Self::StationStatusChanged,
        Self::BootNotification,
        Self::HeartbeatReceived,
        Self::ConnectorStatusChanged,
        Self::TransactionStarted,
        Self::TransactionStopped,
        Self::MeterValues,
        Self::AuthorizationResult,
        Self::Error,
    ];

    /// Canonical lower snake_case name.
    pub fn as_str(&self) -> &str {
        match self {
            Self::StationConnected => "station_connected",
            Self::StationDisconnected => "station_disconnected",
            Self::StationStatusChanged => "station_status_changed",
            Self::BootNotification => "boot_notification",
            Self::HeartbeatReceived => "heartbeat_received",
            Self::ConnectorStatusChanged => "connector_status_changed",
            Self::TransactionStarted => "transaction_started",
            Self::TransactionStopped => "transaction_stopped",
            Self::MeterValues => "meter_values",
            Self::AuthorizationResult => "authorization_result",
            Self::Error => "error",
            Self::Other(name) => name,
        }
    }

    /// Name the backend uses for this kind in subscription filters.
    ///
    /// Station presence kinds still go by their `charge_point_*` names there.
    pub fn wire_name(&self) -> &str {
        match self {
            Self::StationConnected => "charge_point_connected",
            Self::StationDisconnected => "charge_point_disconnected",
            Self::StationStatusChanged => "charge_point_status_changed",
            other => other.as_str(),
        }
    }

    /// Resolve a wire marker in any casing (`TransactionStarted`,
    /// `transaction-started`, `TRANSACTION_STARTED`, ...) to a kind.
    pub fn from_marker(marker: &str) -> Self {
        Self::from_snake(to_snake_case(marker))
    }

    /// Resolve an already snake_cased name, folding legacy aliases.
    pub(crate) fn from_snake(name: String) -> Self {
        match name.as_str() {
            "station_connected" | "charge_point_connected" => Self::StationConnected,
            "station_disconnected" | "charge_point_disconnected" => Self::StationDisconnected,
            "station_status_changed" | "charge_point_status_changed" => {
                Self::StationStatusChanged
            }
            "boot_notification" => Self::BootNotification,
            "heartbeat_received" => Self::HeartbeatReceived,
            "connector_status_changed" => Self::ConnectorStatusChanged,
            "transaction_started" => Self::TransactionStarted,
            "transaction_stopped" => Self::TransactionStopped,
            "meter_values" | "meter_values_received" => Self::MeterValues,
            "authorization_result" => Self::AuthorizationResult,
            "error" => Self::Error,
            _ => Self::Other(name),
        }
    }

    /// True for every kind except [`EventKind::Other`].
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_marker(s))
    }
}

impl Serialize for EventKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let marker = String::deserialize(deserializer)?;
        Ok(Self::from_marker(&marker))
    }
}

/// Convert a marker from PascalCase, camelCase, kebab-case, dotted or
/// SCREAMING_CASE into lower snake_case.
///
/// Acronym runs stay together (`HTTPError` becomes `http_error`). Any
/// non-alphanumeric character acts as a separator; leading, trailing and
/// repeated separators collapse.
pub fn to_snake_case(marker: &str) -> String {
    let chars: Vec<char> = marker.trim().chars().collect();
    let mut out = String::with_capacity(chars.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if !c.is_alphanumeric() {
            if !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
            continue;
        }
        if c.is_uppercase() {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1).copied();
            let boundary = match prev {
                Some(p) if p.is_lowercase() || p.is_numeric() => true,
                Some(p) if p.is_uppercase() => next.is_some_and(char::is_lowercase),
                _ => false,
            };
            if boundary && !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}
