//! Shared protocol types for chargewire.
//!
//! This crate defines the canonical [`Event`] record produced from push-channel
//! frames, the closed [`EventKind`] set, the connection [`Phase`] shown by UI
//! indicators, and the [`MsgToUI`] messages the ingestion core emits towards
//! the request/cache layer and the notification sink.
//!
//! Frame decoding lives in [`codec`]; station- and kind-scoped subscriptions in
//! [`Subscription`].

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod codec;
mod event;
mod kind;
mod subscription;

pub use event::{Event, parse_instant};
pub use kind::{EventKind, to_snake_case};
pub use subscription::Subscription;

/// Connectivity state of the push channel, as shown by status indicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// No live socket and no attempt in flight.
    #[default]
    Disconnected,
    /// A socket is being opened.
    Connecting,
    /// The socket is open and frames are flowing.
    Connected,
    /// The last attempt failed, or retries are exhausted.
    Error,
}

impl Phase {
    /// Lower-case name used on the wire and in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity of a transient user-facing notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotifyKind {
    /// Neutral information.
    Info,
    /// Something needs attention.
    Warn,
    /// Something failed.
    Error,
    /// Something completed.
    Success,
}

/// UI channel helpers.
pub mod ui {
    use super::MsgToUI;

    /// Tokio unbounded sender for UI messages.
    pub type UiTx = tokio::sync::mpsc::UnboundedSender<MsgToUI>;
    /// Tokio unbounded receiver for UI messages.
    pub type UiRx = tokio::sync::mpsc::UnboundedReceiver<MsgToUI>;

    /// Create a standard unbounded UI channel (sender, receiver).
    pub fn ui_channel() -> (UiTx, UiRx) {
        tokio::sync::mpsc::unbounded_channel::<MsgToUI>()
    }
}

/// Messages sent from the ingestion core to the UI and request layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MsgToUI {
    /// Mark a cached read-model stale so the request layer refetches it.
    Invalidate {
        /// Opaque cache key, e.g. `station:CP1:connectors`.
        key: String,
    },

    /// Show a transient notification.
    Notify {
        /// Severity.
        kind: NotifyKind,
        /// Short heading.
        title: String,
        /// Body text.
        text: String,
    },
}
