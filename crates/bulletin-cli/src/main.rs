//! `bulletin`: publish per-client notice lists from the catalog in the working directory.
//!
//! Reads `schema.json`, `source.json`, and `clients.json`, and writes
//! `results.<scope>.json` / `results.<scope>.min.json` next to them.
//! Takes no arguments.

use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use bulletin_store_fs::{FsStore, StoreLayout};
use time::OffsetDateTime;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const LOG_DIRECTIVE: &str = "info";

fn main() -> ExitCode {
    if let Err(err) = init_tracing() {
        eprintln!("{err:#}");
    }

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            println!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    if std::env::args_os().len() > 1 {
        warn!("command-line arguments are ignored; inputs are read from fixed locations");
    }

    let base_dir = std::env::current_dir().context("failed to resolve working directory")?;
    let store = FsStore::open(StoreLayout::new(base_dir));
    let now = OffsetDateTime::now_utc();

    let summary = store.publish(now)?;
    info!(scopes = summary.artifacts.len(), "publication complete");
    Ok(())
}

fn init_tracing() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_env_filter(EnvFilter::new(LOG_DIRECTIVE))
        .try_init()
        .map_err(|err| anyhow!("failed to install log subscriber: {err}"))
}
