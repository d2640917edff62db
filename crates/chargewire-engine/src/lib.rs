//! chargewire engine
//!
//! The socket-free core of the push-channel ingestion layer:
//! - [`Reconnector`]: the reconnection policy, a pure state machine that turns
//!   [`Signal`]s into [`Effect`]s for an imperative owner to carry out
//! - [`Dispatcher`]: records each canonical event and fans it out to
//!   observers, the cache layer and the notification sink
//! - [`table`]: the cache invalidation table, the one place event kinds are
//!   wired to cache keys
//! - [`StatusStore`]: connection phase and the bounded live feed
//!
//! Nothing in this crate performs I/O or reads a clock; the `chargewire-client`
//! crate drives it over a real socket.

mod cache;
mod dispatch;
mod error;
mod notify;
mod policy;
mod store;
pub mod table;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_support;

pub use cache::{CacheKey, CacheSink};
pub use dispatch::{Dispatcher, ObserverFn, ObserverId};
pub use error::{Error, Result};
pub use notify::{Notification, NotificationDispatcher, PLACEHOLDER, describe, notification_for};
pub use policy::{
    Backoff, DEFAULT_BASE, DEFAULT_CEILING, DEFAULT_MAX_ATTEMPTS, Effect, HandleId, Reconnector,
    Signal, State, Strategy, TimerId,
};
pub use store::{DEFAULT_FEED_CAPACITY, StatusStore};
