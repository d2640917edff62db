#![warn(missing_docs)]

//! Shared logging helpers and CLI argument definitions for the chargewire workspace.
//!
//! - [`LogArgs`]: log level flags shared by binaries
//! - [`compute_spec`]: resolve flags and `RUST_LOG` into one filter directive
//! - [`init`]: install the `fmt` subscriber for a binary

use std::{env, io};

use clap::Args;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Directive appended to environment-provided specs to quiet the socket library.
const QUIET_TRANSPORT: &str = "tungstenite=warn";

/// Logging controls for CLI apps.
#[derive(Debug, Clone, Default, Args)]
pub struct LogArgs {
    /// Set global log level to trace (our crates only)
    #[arg(long, conflicts_with_all = ["debug", "log_level", "log_filter"])]
    pub trace: bool,

    /// Set global log level to debug (our crates only)
    #[arg(long, conflicts_with_all = ["trace", "log_level", "log_filter"])]
    pub debug: bool,

    /// Set a single global log level for our crates (error|warn|info|debug|trace)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Set an explicit tracing filter directive (overrides other flags)
    /// e.g. "chargewire_client=trace,chargewire_engine=debug"
    #[arg(long)]
    pub log_filter: Option<String>,
}

impl LogArgs {
    /// The filter spec these flags select, consulting `RUST_LOG` last.
    pub fn spec(&self) -> String {
        compute_spec(
            self.trace,
            self.debug,
            self.log_level.as_deref(),
            self.log_filter.as_deref(),
        )
    }
}

/// List of crate targets that constitute "our" logs.
pub fn our_crates() -> &'static [&'static str] {
    &[
        "chargewire",
        "chargewire_client",
        "chargewire_engine",
        "chargewire_protocol",
        "config",
        "logging",
    ]
}

/// Build a filter directive string that sets the same `level` for all of our crates.
pub fn level_spec_for(level: &str) -> String {
    let lvl = level.to_ascii_lowercase();
    our_crates()
        .iter()
        .map(|t| format!("{}={}", t, lvl))
        .collect::<Vec<_>>()
        .join(",")
}

/// Compute the final filter spec string with precedence:
/// - `log_filter`
/// - `trace`/`debug`/`log_level` (crate-scoped)
/// - `RUST_LOG` env (plus `tungstenite=warn` if tungstenite is not mentioned)
/// - default to crate-scoped `info`
pub fn compute_spec(
    trace: bool,
    debug: bool,
    log_level: Option<&str>,
    log_filter: Option<&str>,
) -> String {
    compute_spec_with_env(
        trace,
        debug,
        log_level,
        log_filter,
        env::var("RUST_LOG").ok().as_deref(),
    )
}

/// [`compute_spec`] with an explicit `RUST_LOG` value.
pub fn compute_spec_with_env(
    trace: bool,
    debug: bool,
    log_level: Option<&str>,
    log_filter: Option<&str>,
    rust_log: Option<&str>,
) -> String {
    if let Some(spec) = log_filter {
        return spec.to_string();
    }
    if trace {
        return level_spec_for("trace");
    }
    if debug {
        return level_spec_for("debug");
    }
    if let Some(lvl) = log_level {
        return level_spec_for(lvl);
    }
    match rust_log {
        Some(spec) if spec.contains("tungstenite") => spec.to_string(),
        Some(spec) => format!("{},{}", spec, QUIET_TRANSPORT),
        None => level_spec_for("info"),
    }
}

/// Create an `EnvFilter` from a spec string.
pub fn env_filter_from_spec(spec: &str) -> EnvFilter {
    EnvFilter::new(spec)
}

/// Install a stderr `fmt` subscriber filtered by `args`.
///
/// Returns false when a global subscriber was already installed.
pub fn init(args: &LogArgs) -> bool {
    let spec = args.spec();
    let installed = tracing_subscriber::registry()
        .with(env_filter_from_spec(&spec))
        .with(fmt::layer().with_target(true).with_writer(io::stderr))
        .try_init()
        .is_ok();
    if installed {
        debug!(spec = %spec, "logging initialized");
    }
    installed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_spec_covers_every_crate() {
        let spec = level_spec_for("DEBUG");
        for krate in our_crates() {
            assert!(spec.contains(&format!("{krate}=debug")), "{spec}");
        }
        assert!(!spec.contains("tungstenite"));
    }

    #[test]
    fn explicit_filter_wins() {
        let spec = compute_spec_with_env(false, false, Some("warn"), Some("x=trace"), Some("y"));
        assert_eq!(spec, "x=trace");
    }

    #[test]
    fn flags_beat_environment() {
        let spec = compute_spec_with_env(true, false, None, None, Some("debug"));
        assert!(spec.contains("chargewire_client=trace"));
        let spec = compute_spec_with_env(false, false, Some("error"), None, Some("debug"));
        assert!(spec.contains("config=error"));
    }

    #[test]
    fn environment_gets_transport_quieted() {
        assert_eq!(
            compute_spec_with_env(false, false, None, None, Some("debug")),
            "debug,tungstenite=warn"
        );
        assert_eq!(
            compute_spec_with_env(false, false, None, None, Some("tungstenite=trace")),
            "tungstenite=trace"
        );
    }

    #[test]
    fn default_is_crate_scoped_info() {
        assert_eq!(
            compute_spec_with_env(false, false, None, None, None),
            level_spec_for("info")
        );
    }
}
