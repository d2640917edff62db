//! Startup configuration for chargewire.
//!
//! A config is read once: an optional RON file, then an environment overlay.
//! Command-line flags are applied by the binary on top of the result.

use std::{
    env,
    path::{Path, PathBuf},
};

mod error;
mod loader;
mod types;

#[cfg(test)]
mod test_parse;

pub use error::Error;
pub use loader::{
    ENV_RECONNECT_INTERVAL_MS, ENV_RECONNECT_MAX_ATTEMPTS, ENV_RECONNECT_STRATEGY, ENV_WS_URL,
    apply_env, load, load_from_path, load_from_str,
};
pub use types::{
    BackoffStrategy, Config, DEFAULT_BASE_INTERVAL_MS, DEFAULT_CEILING_MS, DEFAULT_FEED_CAPACITY,
    DEFAULT_MAX_ATTEMPTS, DEFAULT_WS_URL, Reconnect,
};

/// Determine the preferred user config path (`~/.chargewire/config.ron`).
pub fn default_config_path() -> PathBuf {
    let mut p = PathBuf::from(env::var_os("HOME").unwrap_or_default());
    p.push(".chargewire");
    p.push("config.ron");
    p
}

/// Resolve the config file to read, if any.
///
/// Policy:
/// 1) Use `explicit` when provided, whether or not it exists.
/// 2) Else use `~/.chargewire/config.ron` when it exists.
/// 3) Else `None`: run on built-in defaults.
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let preferred = default_config_path();
    preferred.exists().then_some(preferred)
}
