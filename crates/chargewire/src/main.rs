#![warn(missing_docs)]

//! Entry point for the `chargewire` binary.

mod cli;
mod console;
mod error;

use std::process;

use chargewire_client::Client;
use clap::Parser;
use tokio::runtime;
use tracing::error;

use crate::{cli::Cli, error::Result};

fn main() {
    if let Err(err) = run() {
        error!("{err}");
        eprintln!("error: {err}");
        process::exit(1);
    }
}

/// Parse CLI arguments, install logging, load config and tail the channel.
fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.log);

    let mut cfg = config::load(cli.config.as_deref())?;
    cli.apply(&mut cfg);
    cfg.validate()?;

    let rt = runtime::Builder::new_current_thread().enable_all().build()?;
    rt.block_on(async {
        let client = Client::from_config(&cfg)?;
        console::tail(client).await
    })
}
