use std::{env, fs, path::Path};

use tracing::debug;

use crate::{BackoffStrategy, Config, Error, resolve_config_path};

/// Environment variable overriding `ws_url`.
pub const ENV_WS_URL: &str = "CHARGEWIRE_WS_URL";
/// Environment variable overriding `reconnect.base_interval_ms`.
pub const ENV_RECONNECT_INTERVAL_MS: &str = "CHARGEWIRE_RECONNECT_INTERVAL_MS";
/// Environment variable overriding `reconnect.max_attempts`.
pub const ENV_RECONNECT_MAX_ATTEMPTS: &str = "CHARGEWIRE_RECONNECT_MAX_ATTEMPTS";
/// Environment variable overriding `reconnect.strategy`.
pub const ENV_RECONNECT_STRATEGY: &str = "CHARGEWIRE_RECONNECT_STRATEGY";

/// Parse a RON config from `source` without validating it.
pub fn load_from_str(source: &str, path: Option<&Path>) -> Result<Config, Error> {
    ron::from_str::<Config>(source).map_err(|e| Error::Parse {
        path: path.map(Path::to_path_buf),
        message: e.to_string(),
    })
}

/// Read, parse and validate a RON config file.
pub fn load_from_path(path: &Path) -> Result<Config, Error> {
    let source = fs::read_to_string(path).map_err(|e| Error::Read {
        path: Some(path.to_path_buf()),
        message: e.to_string(),
    })?;
    let cfg = load_from_str(&source, Some(path))?;
    cfg.validate().map_err(|e| e.with_path(path))?;
    Ok(cfg)
}

/// Overlay environment values onto `cfg`. `lookup` returns the value of a
/// variable, or `None` when unset.
pub fn apply_env<F>(cfg: &mut Config, lookup: F) -> Result<(), Error>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup(ENV_WS_URL) {
        cfg.ws_url = url;
    }
    if let Some(raw) = lookup(ENV_RECONNECT_INTERVAL_MS) {
        cfg.reconnect.base_interval_ms = raw.trim().parse().map_err(|_| {
            Error::invalid(ENV_RECONNECT_INTERVAL_MS, format!("'{raw}' is not a whole number"))
        })?;
    }
    if let Some(raw) = lookup(ENV_RECONNECT_MAX_ATTEMPTS) {
        cfg.reconnect.max_attempts = raw.trim().parse().map_err(|_| {
            Error::invalid(ENV_RECONNECT_MAX_ATTEMPTS, format!("'{raw}' is not a whole number"))
        })?;
    }
    if let Some(raw) = lookup(ENV_RECONNECT_STRATEGY) {
        cfg.reconnect.strategy = BackoffStrategy::parse(&raw).ok_or_else(|| {
            Error::invalid(
                ENV_RECONNECT_STRATEGY,
                format!("'{raw}' is not one of: fixed, exponential"),
            )
        })?;
    }
    Ok(())
}

/// Load the effective startup configuration.
///
/// The file is `explicit` when given, else `~/.chargewire/config.ron` when it
/// exists, else built-in defaults. The process environment is overlaid on top
/// and the result validated.
pub fn load(explicit: Option<&Path>) -> Result<Config, Error> {
    let path = resolve_config_path(explicit);
    let mut cfg = match &path {
        Some(p) => {
            debug!(path = %p.display(), "loading config");
            load_from_path(p)?
        }
        None => {
            debug!("no config file, using defaults");
            Config::default()
        }
    };
    apply_env(&mut cfg, |name| env::var(name).ok())?;
    cfg.validate()?;
    Ok(cfg)
}
