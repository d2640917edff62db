use std::{collections::VecDeque, sync::Arc};

use chargewire_protocol::{Event, Phase};
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::debug;

/// Default number of events kept in the live feed.
pub const DEFAULT_FEED_CAPACITY: usize = 100;

/// Bounded, most-recent-first event log.
struct Feed {
    events: VecDeque<Event>,
    capacity: usize,
    /// Counter behind `local-<n>` ids for events that arrived without one.
    next_local_id: u64,
}

/// Connection phase and live event feed for one session.
///
/// Cloning is cheap and every clone observes the same state. Writes go through
/// [`StatusStore::set_phase`] and [`StatusStore::append_event`] only.
#[derive(Clone)]
pub struct StatusStore {
    phase: Arc<watch::Sender<Phase>>,
    feed: Arc<Mutex<Feed>>,
}

impl Default for StatusStore {
    fn default() -> Self {
        Self::new(DEFAULT_FEED_CAPACITY)
    }
}

impl StatusStore {
    /// Create a store holding at most `capacity` events (minimum 1), starting
    /// in [`Phase::Disconnected`].
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _rx) = watch::channel(Phase::Disconnected);
        Self {
            phase: Arc::new(tx),
            feed: Arc::new(Mutex::new(Feed {
                events: VecDeque::with_capacity(capacity),
                capacity,
                next_local_id: 0,
            })),
        }
    }

    /// Replace the current phase. Returns true when the value changed.
    pub fn set_phase(&self, phase: Phase) -> bool {
        let changed = self.phase.send_if_modified(|current| {
            if *current == phase {
                return false;
            }
            *current = phase;
            true
        });
        if changed {
            debug!(phase = %phase, "phase_changed");
        }
        changed
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    /// Receiver that wakes on every phase change.
    pub fn watch_phase(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    /// Prepend `event` to the feed, evicting the oldest entry when full.
    ///
    /// An empty id is replaced by a locally generated `local-<n>`. Returns the
    /// event as stored.
    pub fn append_event(&self, mut event: Event) -> Event {
        let mut feed = self.feed.lock();
        if event.id.is_empty() {
            feed.next_local_id += 1;
            event.id = format!("local-{}", feed.next_local_id);
        }
        if feed.events.len() == feed.capacity {
            feed.events.pop_back();
        }
        feed.events.push_front(event.clone());
        event
    }

    /// Up to `n` most recent events, newest first.
    pub fn latest(&self, n: usize) -> Vec<Event> {
        self.feed.lock().events.iter().take(n).cloned().collect()
    }

    /// Number of buffered events.
    pub fn len(&self) -> usize {
        self.feed.lock().events.len()
    }

    /// True when the feed holds no events.
    pub fn is_empty(&self) -> bool {
        self.feed.lock().events.is_empty()
    }

    /// Maximum number of buffered events.
    pub fn capacity(&self) -> usize {
        self.feed.lock().capacity
    }

    /// Drop every buffered event.
    pub fn clear_events(&self) {
        self.feed.lock().events.clear();
    }
}
