use std::sync::Arc;

use chargewire_protocol::{Event, Subscription};
use parking_lot::Mutex;
use tracing::{trace, warn};

use crate::{
    cache::CacheSink,
    notify::{NotificationDispatcher, notification_for},
    store::StatusStore,
    table::keys_for,
};

/// Callback invoked with every dispatched event that matches its filter.
pub type ObserverFn = Arc<dyn Fn(&Event) + Send + Sync>;

/// Registration handle returned by [`Dispatcher::observe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// One registered observer.
struct ObserverEntry {
    /// Registration id.
    id: ObserverId,
    /// Events outside this scope are not forwarded.
    filter: Subscription,
    /// The callback.
    callback: ObserverFn,
}

/// Registered observers plus the id counter.
#[derive(Default)]
struct Observers {
    /// Active registrations, in registration order.
    entries: Vec<ObserverEntry>,
    /// Last id handed out.
    last_id: u64,
}

/// Fans each canonical event out to the feed, observers, the cache layer and
/// the notification sink.
#[derive(Clone)]
pub struct Dispatcher {
    /// Feed and phase.
    store: StatusStore,
    /// Stale-mark facility.
    cache: Arc<dyn CacheSink>,
    /// Notification sink.
    notifier: NotificationDispatcher,
    /// Observer registrations.
    observers: Arc<Mutex<Observers>>,
}

impl Dispatcher {
    /// Create a dispatcher writing to `store`, invalidating through `cache` and
    /// raising notifications through `notifier`.
    pub fn new(
        store: StatusStore,
        cache: Arc<dyn CacheSink>,
        notifier: NotificationDispatcher,
    ) -> Self {
        Self {
            store,
            cache,
            notifier,
            observers: Arc::new(Mutex::new(Observers::default())),
        }
    }

    /// The store this dispatcher appends to.
    pub fn store(&self) -> &StatusStore {
        &self.store
    }

    /// Register `callback` for events matching `filter`.
    pub fn observe<F>(&self, filter: Subscription, callback: F) -> ObserverId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let mut observers = self.observers.lock();
        observers.last_id += 1;
        let id = ObserverId(observers.last_id);
        observers.entries.push(ObserverEntry {
            id,
            filter,
            callback: Arc::new(callback),
        });
        id
    }

    /// Remove an observer. Returns false if it was not registered.
    pub fn unobserve(&self, id: ObserverId) -> bool {
        let mut observers = self.observers.lock();
        let before = observers.entries.len();
        observers.entries.retain(|e| e.id != id);
        observers.entries.len() != before
    }

    /// Record `event` and apply its side effects, in order: feed, observers,
    /// cache invalidation, notification.
    ///
    /// Unknown kinds reach the feed and observers and stop there. Failures of
    /// the cache or notification sinks are logged and do not interrupt the
    /// remaining steps.
    pub fn dispatch(&self, event: Event) {
        let event = self.store.append_event(event);
        trace!(id = %event.id, kind = %event.kind, station = %event.station_id, "dispatch");

        // Callbacks run outside the lock so they may register or remove observers.
        let callbacks: Vec<ObserverFn> = self
            .observers
            .lock()
            .entries
            .iter()
            .filter(|e| e.filter.matches(&event))
            .map(|e| e.callback.clone())
            .collect();
        for cb in callbacks {
            cb(&event);
        }

        for key in keys_for(&event) {
            if let Err(e) = self.cache.invalidate(&key) {
                warn!(key = %key, error = %e, "cache invalidation failed");
            }
        }

        if let Some(n) = notification_for(&event) {
            if let Err(e) = self.notifier.send(n) {
                warn!(error = %e, "notification failed");
            }
        }
    }
}
