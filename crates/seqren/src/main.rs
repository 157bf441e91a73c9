//! seqren - sequential renamer for multi-file shell launches
//!
//! A shell context menu starts one process per selected file. The first
//! process becomes the leader, gathers every path through the local channel,
//! and renames the whole selection as one sorted sequence.

mod aggregator;
mod cli;
mod logging;
mod session;

use clap::Parser;
use libseqren_core::{config::config_path, load_config, save_config, SeqrenConfig};
use libseqren_ipc::{Endpoint, LeaderLock};
use tracing::{info, warn};

use cli::Cli;
use session::{Outcome, Session};

/// Load the user config. A broken file must not stop a launch, so any
/// problem falls back to defaults and is reported once logging is up.
fn load_user_config() -> (SeqrenConfig, Option<String>) {
    let Some(path) = config_path() else {
        return (SeqrenConfig::default(), None);
    };
    match load_config(&path) {
        Ok(config) => (config.unwrap_or_default(), None),
        Err(e) => (
            SeqrenConfig::default(),
            Some(format!("Ignoring config {}: {}", path.display(), e)),
        ),
    }
}

/// Print the endpoint and whoever currently leads it
fn print_status(endpoint: &Endpoint) {
    println!("endpoint: {}", endpoint.address());
    println!("lock file: {}", endpoint.lock_path().display());

    let info = LeaderLock::read_info(endpoint.lock_path());

    // Info left behind by a crashed leader is stale if the lock is free
    let mut check = LeaderLock::new(endpoint.lock_path());
    if endpoint.lock_path().exists() && check.acquire() {
        check.release();
        println!("leader: none");
        return;
    }

    match info {
        Ok(Some(info)) => println!("leader: pid {} (since {} ms)", info.pid, info.started_ts),
        Ok(None) if endpoint.lock_path().exists() => println!("leader: running (no details)"),
        Ok(None) => println!("leader: none"),
        Err(e) => println!("leader: unknown ({})", e),
    }
}

/// Write the default config unless one is already present
fn init_config() {
    let Some(path) = config_path() else {
        eprintln!("No config directory could be determined; set SEQREN_CONFIG");
        return;
    };
    if path.exists() {
        println!("Config already exists: {}", path.display());
        return;
    }
    match save_config(&path, &SeqrenConfig::default()) {
        Ok(()) => println!("Wrote default config: {}", path.display()),
        Err(e) => eprintln!("Failed to write {}: {}", path.display(), e),
    }
}

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return;
        }
    };

    if cli.init_config {
        init_config();
        return;
    }

    let (config, config_warning) = load_user_config();
    logging::init(&config);
    if let Some(message) = config_warning {
        warn!("{}", message);
    }

    let endpoint = Endpoint::default_for_user();
    if cli.status {
        print_status(&endpoint);
        return;
    }

    let paths = cli.paths();
    info!(endpoint = %endpoint, files = paths.len(), "Starting seqren");

    match Session::new(config, endpoint).run(paths).await {
        Outcome::Renamed(report) => match report.into_result() {
            Ok(report) => info!(
                requested = report.requested,
                renamed = report.renamed,
                unchanged = report.unchanged,
                missing = report.missing,
                "Rename complete"
            ),
            Err(e) => warn!("Rename finished with errors: {}", e),
        },
        Outcome::Forwarded { delivered: true } => info!("Paths handed to the running instance"),
        Outcome::Forwarded { delivered: false } => {
            warn!("Could not reach the running instance; these files were not renamed")
        }
        Outcome::Served { cycles } => info!(cycles, "Standing instance stopped"),
        Outcome::Idle => {}
    }
}
