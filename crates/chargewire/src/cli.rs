//! Command-line interface definitions for chargewire.

use std::path::PathBuf;

use chargewire_protocol::EventKind;
use clap::Parser;
use logging::LogArgs;

/// Command-line interface for the `chargewire` binary.
#[derive(Parser, Debug)]
#[command(
    name = "chargewire",
    about = "Tail the charging backend's push channel",
    version
)]
pub struct Cli {
    /// Logging controls shared across chargewire binaries.
    #[command(flatten)]
    pub log: LogArgs,

    /// Path to a RON config file (default: ~/.chargewire/config.ron when present).
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Push-channel URL, overriding config and environment.
    #[arg(long, value_name = "URL")]
    pub url: Option<String>,

    /// Only receive events for this station.
    #[arg(long, value_name = "ID")]
    pub station: Option<String>,

    /// Only receive these event kinds, comma separated.
    #[arg(long, value_name = "KINDS", value_delimiter = ',')]
    pub events: Vec<String>,

    /// Number of automatic retries before giving up.
    #[arg(long, value_name = "N")]
    pub max_attempts: Option<u32>,
}

impl Cli {
    /// Apply flag overrides on top of a loaded config.
    pub fn apply(&self, cfg: &mut config::Config) {
        if let Some(url) = &self.url {
            cfg.ws_url = url.clone();
        }
        if let Some(station) = &self.station {
            cfg.subscription.station_id = Some(station.clone());
        }
        if !self.events.is_empty() {
            cfg.subscription.kinds = self
                .events
                .iter()
                .map(|k| k.trim())
                .filter(|k| !k.is_empty())
                .map(EventKind::from_marker)
                .collect();
        }
        if let Some(n) = self.max_attempts {
            cfg.reconnect.max_attempts = n;
        }
    }
}
