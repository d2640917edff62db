//! Test support utilities for chargewire-engine unit and integration tests.
//! Enabled for downstream crates with the `test-utils` feature.

use std::{mem, sync::Arc};

use parking_lot::Mutex;

use crate::{
    Result,
    cache::{CacheKey, CacheSink},
};

/// Cache sink that records every invalidated key in call order.
#[derive(Clone, Default)]
pub struct RecordingCache {
    /// Keys seen so far.
    keys: Arc<Mutex<Vec<CacheKey>>>,
}

impl RecordingCache {
    /// Keys invalidated so far, in order.
    pub fn keys(&self) -> Vec<String> {
        self.keys.lock().iter().map(ToString::to_string).collect()
    }

    /// Return the recorded keys and start over.
    pub fn take(&self) -> Vec<String> {
        let keys = mem::take(&mut *self.keys.lock());
        keys.iter().map(ToString::to_string).collect()
    }
}

impl CacheSink for RecordingCache {
    fn invalidate(&self, key: &CacheKey) -> Result<()> {
        self.keys.lock().push(key.clone());
        Ok(())
    }
}
