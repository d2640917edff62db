use std::fmt;

use chargewire_protocol::{MsgToUI, ui::UiTx};

use crate::{Error, Result};

/// Identifier of one cached read-model entry owned by the request layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Wrap a key string.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Borrow the key string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<&str> for CacheKey {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Stale-mark facility of the external request/cache layer.
///
/// The core only ever asks for invalidation; fetching and storing data is the
/// request layer's business.
pub trait CacheSink: Send + Sync {
    /// Mark `key` stale so it is refetched by whoever reads it next.
    fn invalidate(&self, key: &CacheKey) -> Result<()>;
}

impl CacheSink for UiTx {
    fn invalidate(&self, key: &CacheKey) -> Result<()> {
        self.send(MsgToUI::Invalidate {
            key: key.to_string(),
        })
        .map_err(|_| Error::ChannelClosed)
    }
}
