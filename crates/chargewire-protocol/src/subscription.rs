use serde::{Deserialize, Serialize};
use url::Url;

use crate::{Event, EventKind};

/// Query parameter naming the station a subscription is scoped to.
const STATION_PARAM: &str = "charge_point_id";
/// Query parameter listing the event kinds a subscription is scoped to.
const KINDS_PARAM: &str = "event_types";

/// Scope of a push-channel subscription: an optional station and an optional
/// set of kinds. An empty scope receives everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Subscription {
    /// Only events for this station.
    pub station_id: Option<String>,
    /// Only events of these kinds; empty means all kinds.
    pub kinds: Vec<EventKind>,
}

impl Subscription {
    /// An unscoped subscription.
    pub fn all() -> Self {
        Self::default()
    }

    /// A subscription scoped to one station.
    pub fn station(station_id: impl Into<String>) -> Self {
        Self {
            station_id: Some(station_id.into()),
            kinds: Vec::new(),
        }
    }

    /// Restrict to the given kinds.
    pub fn with_kinds(mut self, kinds: impl IntoIterator<Item = EventKind>) -> Self {
        self.kinds = kinds.into_iter().collect();
        self
    }

    /// True when neither a station nor kinds are set.
    pub fn is_unscoped(&self) -> bool {
        self.station_id.is_none() && self.kinds.is_empty()
    }

    /// Whether `event` falls inside this scope.
    pub fn matches(&self, event: &Event) -> bool {
        let station_ok = self
            .station_id
            .as_deref()
            .is_none_or(|id| id == event.station_id);
        let kind_ok = self.kinds.is_empty() || self.kinds.contains(&event.kind);
        station_ok && kind_ok
    }

    /// Append the scope to `base` as `charge_point_id` / `event_types` query
    /// parameters. An unscoped subscription returns `base` unchanged.
    pub fn apply_to(&self, base: &Url) -> Url {
        let mut url = base.clone();
        if self.is_unscoped() {
            return url;
        }
        {
            let mut query = url.query_pairs_mut();
            if let Some(id) = &self.station_id {
                query.append_pair(STATION_PARAM, id);
            }
            if !self.kinds.is_empty() {
                let kinds: Vec<&str> = self.kinds.iter().map(EventKind::wire_name).collect();
                query.append_pair(KINDS_PARAM, &kinds.join(","));
            }
        }
        url
    }
}
