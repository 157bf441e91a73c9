//! Process entry: leader election and the leader/follower flows
//!
//! Every launch races for the leadership lock. Followers forward their own
//! paths to the leader and exit. The leader serves the channel and either
//! collects one debounced batch (launched with files) or keeps collecting
//! batches until it is told to stop (launched without files).

use std::future::Future;
use std::time::Duration;

use libseqren_core::{rename_files, RenameReport, SeqrenConfig};
use libseqren_ipc::{ChannelClient, ChannelServer, Endpoint, LeaderInfo, LeaderLock};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::aggregator::Aggregator;

/// Role decided once per process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessRole {
    Leader,
    Follower,
}

/// What a launch ended up doing
#[derive(Debug)]
pub enum Outcome {
    /// Follower handed its paths to the leader (or failed to)
    Forwarded { delivered: bool },
    /// Follower launched without paths; nothing to do
    Idle,
    /// Leader flushed one aggregated batch
    Renamed(RenameReport),
    /// Leader ran without initial paths and served this many batches
    Served { cycles: usize },
}

/// One process launch
pub struct Session {
    config: SeqrenConfig,
    endpoint: Endpoint,
}

impl Session {
    pub fn new(config: SeqrenConfig, endpoint: Endpoint) -> Self {
        Self { config, endpoint }
    }

    /// Decide the role and run the matching flow to completion
    pub async fn run(self, paths: Vec<String>) -> Outcome {
        if let Err(e) = self.endpoint.ensure_dir() {
            warn!(endpoint = %self.endpoint, "Cannot create runtime directory: {}", e);
        }

        let mut lock = LeaderLock::new(self.endpoint.lock_path());
        let role = if lock.acquire() {
            ProcessRole::Leader
        } else {
            ProcessRole::Follower
        };
        info!(role = ?role, files = paths.len(), "Role decided");

        match role {
            ProcessRole::Follower => self.forward(paths).await,
            ProcessRole::Leader => {
                if let Err(e) = lock.write_info(&LeaderInfo::current(self.endpoint.address())) {
                    debug!("Could not record leader info: {}", e);
                }
                let outcome = self.lead(paths).await;
                lock.release();
                outcome
            }
        }
    }

    async fn forward(&self, paths: Vec<String>) -> Outcome {
        if paths.is_empty() {
            debug!("Follower without files, exiting");
            return Outcome::Idle;
        }

        let client = ChannelClient::new(self.endpoint.clone()).with_retries(self.config.client_retries);
        let delivered = client.send(&paths).await;
        if delivered {
            info!(count = paths.len(), "Forwarded paths to leader");
        }
        Outcome::Forwarded { delivered }
    }

    async fn lead(&self, paths: Vec<String>) -> Outcome {
        let (server, mut batches) = ChannelServer::new(self.endpoint.clone()).start();

        let outcome = if paths.is_empty() {
            let cycles = serve_until(&mut batches, self.config.quiet_interval(), shutdown_signal()).await;
            Outcome::Served { cycles }
        } else {
            let mut aggregator = Aggregator::new(self.config.quiet_interval());
            aggregator.on_batch(paths);
            let report = match aggregator.collect_final(&mut batches).await {
                Some(batch) => rename_batch(batch).await,
                None => RenameReport::default(),
            };
            Outcome::Renamed(report)
        };

        server.shutdown().await;
        outcome
    }
}

/// Run the renamer off the async workers
async fn rename_batch(batch: Vec<String>) -> RenameReport {
    let count = batch.len();
    match tokio::task::spawn_blocking(move || rename_files(&batch)).await {
        Ok(report) => report,
        Err(e) => {
            error!(count, "Rename task failed: {}", e);
            RenameReport {
                requested: count,
                ..Default::default()
            }
        }
    }
}

/// Standing leader: every quiet period closes one cycle and renames what it
/// collected. When `shutdown` resolves the queue is closed, and whatever was
/// already accepted is renamed before returning.
async fn serve_until<S>(
    batches: &mut mpsc::Receiver<Vec<String>>,
    quiet: Duration,
    shutdown: S,
) -> usize
where
    S: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    let mut cycles = 0;
    let mut aggregator = Aggregator::new(quiet);
    loop {
        let collected = tokio::select! {
            batch = aggregator.collect(batches) => batch,
            _ = &mut shutdown => {
                info!("Received shutdown signal");
                aggregator.seal(batches).await;
                if let Some(batch) = aggregator.on_timer_fire() {
                    info!(count = batch.len(), "Renaming pending batch before exit");
                    log_cycle(cycles + 1, &rename_batch(batch).await);
                    cycles += 1;
                }
                break;
            }
        };

        let Some(batch) = collected else {
            break;
        };
        cycles += 1;
        log_cycle(cycles, &rename_batch(batch).await);
        aggregator = Aggregator::new(quiet);
    }
    cycles
}

fn log_cycle(cycle: usize, report: &RenameReport) {
    info!(
        cycle,
        renamed = report.renamed,
        failed = report.failed.len(),
        "Background batch renamed"
    );
}

/// Resolves on Ctrl+C, or SIGTERM on Unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
