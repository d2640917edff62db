use chargewire_protocol::{Event, EventKind, MsgToUI, NotifyKind, ui::UiTx};
use serde_json::Value;
use tracing::info;

use crate::{Error, Result};

/// Rendered in place of any payload field a template needs but the event lacks.
pub const PLACEHOLDER: &str = "unknown";

/// A transient user-facing message derived from an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Severity.
    pub kind: NotifyKind,
    /// Short headline.
    pub title: String,
    /// Body text with payload fields interpolated.
    pub text: String,
}

/// Sends notifications to the UI layer.
#[derive(Clone)]
pub struct NotificationDispatcher {
    /// Outbound UI channel.
    tx: UiTx,
}

impl NotificationDispatcher {
    /// Create a new dispatcher from a UI message channel.
    pub fn new(tx: UiTx) -> Self {
        Self { tx }
    }

    /// Send a notification with the given kind, title, and text.
    pub fn send_notification(&self, kind: NotifyKind, title: String, text: String) -> Result<()> {
        // Every notification shown is logged at info, whatever its severity.
        info!(kind = ?kind, title = %title, text = %text, "notification_display");
        self.tx
            .send(MsgToUI::Notify { kind, title, text })
            .map_err(|_| Error::ChannelClosed)
    }

    /// Send a prepared [`Notification`].
    pub fn send(&self, n: Notification) -> Result<()> {
        self.send_notification(n.kind, n.title, n.text)
    }
}

/// Payload field as text, or the placeholder.
fn or_placeholder(event: &Event, keys: &[&str]) -> String {
    event
        .first_text(keys)
        .unwrap_or_else(|| PLACEHOLDER.to_string())
}

/// Station id, or the placeholder for global events.
fn station(event: &Event) -> &str {
    if event.station_id.is_empty() {
        PLACEHOLDER
    } else {
        &event.station_id
    }
}

/// Delivered energy as kWh text. Accepts `energy_kwh` directly, or Wh from
/// `energy_wh` / `energy` / the `meter_stop - meter_start` difference.
fn energy_kwh(event: &Event) -> Option<String> {
    let num = |key: &str| event.field(key).and_then(Value::as_f64);
    let kwh = num("energy_kwh").or_else(|| {
        num("energy_wh")
            .or_else(|| num("energy"))
            .or_else(|| Some(num("meter_stop")? - num("meter_start")?))
            .map(|wh| wh / 1000.0)
    })?;
    Some(format!("{kwh:.2} kWh"))
}

/// Notification for kinds that mark a transition of consequence, `None` for
/// everything else.
///
/// Transaction starts are included so operators see a session begin at the
/// connector it was started on.
pub fn notification_for(event: &Event) -> Option<Notification> {
    let (kind, title, text) = match &event.kind {
        EventKind::StationDisconnected => (
            NotifyKind::Warn,
            "Station disconnected",
            format!(
                "{} disconnected: {}",
                station(event),
                or_placeholder(event, &["reason"])
            ),
        ),
        EventKind::TransactionStarted => (
            NotifyKind::Info,
            "Transaction started",
            format!(
                "{} connector {}: transaction #{} started",
                station(event),
                event.connector_id().as_deref().unwrap_or(PLACEHOLDER),
                event.transaction_id().as_deref().unwrap_or(PLACEHOLDER),
            ),
        ),
        EventKind::TransactionStopped => (
            NotifyKind::Success,
            "Transaction stopped",
            format!(
                "{}: transaction #{} stopped, energy {}, cost {}",
                station(event),
                event.transaction_id().as_deref().unwrap_or(PLACEHOLDER),
                energy_kwh(event).as_deref().unwrap_or(PLACEHOLDER),
                or_placeholder(event, &["cost", "total_cost"]),
            ),
        ),
        EventKind::Error => (
            NotifyKind::Error,
            "Server error",
            or_placeholder(event, &["message", "error", "value"]),
        ),
        _ => return None,
    };
    Some(Notification {
        kind,
        title: title.to_string(),
        text,
    })
}

/// One-line description of `event` for the live feed.
pub fn describe(event: &Event) -> String {
    let text = |keys: &[&str]| or_placeholder(event, keys);
    match &event.kind {
        EventKind::StationConnected => "connected".to_string(),
        EventKind::StationDisconnected => match event.field_text("reason") {
            Some(reason) => format!("disconnected: {reason}"),
            None => "disconnected".to_string(),
        },
        EventKind::StationStatusChanged => format!("status: {}", text(&["status"])),
        EventKind::BootNotification => {
            let parts: Vec<String> = ["vendor", "model"]
                .iter()
                .filter_map(|k| event.field_text(k))
                .collect();
            if parts.is_empty() {
                "booted".to_string()
            } else {
                format!("booted {}", parts.join(" "))
            }
        }
        EventKind::HeartbeatReceived => "heartbeat".to_string(),
        EventKind::ConnectorStatusChanged => format!(
            "connector {}: {}",
            event.connector_id().as_deref().unwrap_or(PLACEHOLDER),
            text(&["status"])
        ),
        EventKind::TransactionStarted => format!(
            "transaction #{} started",
            event.transaction_id().as_deref().unwrap_or(PLACEHOLDER)
        ),
        EventKind::TransactionStopped => format!(
            "transaction #{} stopped",
            event.transaction_id().as_deref().unwrap_or(PLACEHOLDER)
        ),
        EventKind::MeterValues => "meter values".to_string(),
        EventKind::AuthorizationResult => format!(
            "authorization {}: {}",
            text(&["id_tag", "idTag"]),
            text(&["status"])
        ),
        EventKind::Error => text(&["message", "error", "value"]),
        EventKind::Other(name) => name.clone(),
    }
}
