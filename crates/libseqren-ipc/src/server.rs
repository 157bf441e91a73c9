//! Channel server run by the leader
//!
//! The server:
//! - Accepts one connection at a time on the well-known endpoint
//! - Reads exactly one length-prefixed `PathBatch` per connection
//! - Pushes the decoded paths onto a queue and acknowledges them
//! - Logs and drops malformed messages, then keeps accepting
//! - Backs off and rebinds if the endpoint cannot be created

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::endpoint::Endpoint;
use crate::error::IpcError;
use crate::messages::{read_frame, PathBatch};
use crate::transport::Listener;
use crate::{ACK_BYTE, ACK_TIMEOUT_MS, BIND_BACKOFF_MS};

/// Default capacity of the batch queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Server side of the message channel
#[derive(Debug, Clone)]
pub struct ChannelServer {
    endpoint: Endpoint,
    queue_capacity: usize,
    read_timeout_ms: u64,
}

/// Control handle for a running accept loop
#[derive(Debug)]
pub struct ServerHandle {
    running: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ServerHandle {
    /// Ask the accept loop to stop. A connection already being serviced
    /// finishes first.
    pub fn stop(&self) {
        let _ = self.running.send(false);
    }

    /// Stop the loop and wait for it to exit
    pub async fn shutdown(self) {
        self.stop();
        if let Err(e) = self.task.await {
            warn!("Channel server task ended abnormally: {}", e);
        }
    }
}

impl ChannelServer {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            read_timeout_ms: ACK_TIMEOUT_MS,
        }
    }

    /// Set how long a connected client may take to deliver its message
    pub fn with_read_timeout(mut self, timeout_ms: u64) -> Self {
        self.read_timeout_ms = timeout_ms;
        self
    }

    /// Spawn the accept loop on the current runtime.
    ///
    /// Returns the control handle and the queue of decoded batches.
    pub fn start(self) -> (ServerHandle, mpsc::Receiver<Vec<String>>) {
        let (batch_tx, batch_rx) = mpsc::channel(self.queue_capacity.max(1));
        let (running_tx, running_rx) = watch::channel(true);

        let task = tokio::spawn(self.run(batch_tx, running_rx));

        (
            ServerHandle {
                running: running_tx,
                task,
            },
            batch_rx,
        )
    }

    async fn run(self, batch_tx: mpsc::Sender<Vec<String>>, mut running: watch::Receiver<bool>) {
        info!(endpoint = %self.endpoint, "Channel server starting");

        while *running.borrow() {
            let mut listener = match Listener::bind(&self.endpoint) {
                Ok(listener) => listener,
                Err(e) => {
                    warn!(endpoint = %self.endpoint, "Failed to create endpoint, retrying: {}", e);
                    tokio::time::sleep(Duration::from_millis(BIND_BACKOFF_MS)).await;
                    continue;
                }
            };
            debug!(endpoint = %self.endpoint, "Listening");

            loop {
                tokio::select! {
                    changed = running.changed() => {
                        // Sender gone means nobody can restart us either
                        if changed.is_err() || !*running.borrow() {
                            break;
                        }
                    }
                    accepted = listener.accept() => {
                        match accepted {
                            Ok(conn) => self.serve(conn, &batch_tx).await,
                            Err(e) => {
                                warn!("Accept failed, recreating endpoint: {}", e);
                                tokio::time::sleep(Duration::from_millis(BIND_BACKOFF_MS)).await;
                                break;
                            }
                        }
                    }
                }
            }

            if running.has_changed().is_err() {
                break;
            }
        }

        info!(endpoint = %self.endpoint, "Channel server stopped");
    }

    /// Service one connection to completion
    async fn serve<S>(&self, mut conn: S, batch_tx: &mpsc::Sender<Vec<String>>)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let batch = match self.read_batch(&mut conn).await {
            Ok(batch) => batch,
            Err(e) => {
                warn!("Dropping unreadable message: {}", e);
                return;
            }
        };

        debug!(sender = batch.sender_pid, count = batch.paths.len(), "Batch received");

        if batch_tx.send(batch.paths).await.is_err() {
            // Consumer finished; the client sees no ack and reports failure
            debug!("Batch queue closed, not acknowledging");
            return;
        }

        if let Err(e) = conn.write_all(&[ACK_BYTE]).await {
            debug!("Client left before acknowledgement: {}", e);
            return;
        }
        let _ = conn.flush().await;
    }

    async fn read_batch<S>(&self, conn: &mut S) -> Result<PathBatch, IpcError>
    where
        S: AsyncRead + Unpin,
    {
        let payload = tokio::time::timeout(
            Duration::from_millis(self.read_timeout_ms),
            read_frame(conn),
        )
        .await
        .map_err(|_| IpcError::Timeout(self.read_timeout_ms))??;
        PathBatch::decode(&payload)
    }
}
