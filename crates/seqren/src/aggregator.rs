//! Debounce aggregator
//!
//! Followers launched by one multi-file shell action connect independently
//! and in no particular order. The aggregator buffers every path that
//! arrives and restarts its quiet timer on each arrival; once a full quiet
//! interval passes without arrivals, it sorts the buffer and flushes it
//! exactly once.

use std::collections::HashSet;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info};

/// Pending batch plus its single reschedulable deadline
#[derive(Debug)]
pub struct Aggregator {
    quiet: Duration,
    pending: Vec<String>,
    seen: HashSet<String>,
    deadline: Option<Instant>,
    flushed: bool,
}

impl Aggregator {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            pending: Vec::new(),
            seen: HashSet::new(),
            deadline: None,
            flushed: false,
        }
    }

    /// Buffer an arriving batch and restart the quiet timer.
    ///
    /// Empty batches are ignored entirely. A path already buffered in this
    /// cycle is not added again. Returns the number of new paths.
    pub fn on_batch(&mut self, paths: Vec<String>) -> usize {
        if paths.is_empty() || self.flushed {
            return 0;
        }

        let before = self.pending.len();
        for path in paths {
            if self.seen.insert(path.clone()) {
                self.pending.push(path);
            }
        }
        self.deadline = Some(Instant::now() + self.quiet);

        let added = self.pending.len() - before;
        debug!(added, pending = self.pending.len(), "Batch buffered, timer reset");
        added
    }

    /// When the current quiet interval ends, if anything is pending
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn pending(&self) -> &[String] {
        &self.pending
    }

    /// Take the sorted buffer. Yields at most once, and never an empty batch.
    pub fn on_timer_fire(&mut self) -> Option<Vec<String>> {
        self.deadline = None;
        if self.flushed || self.pending.is_empty() {
            return None;
        }
        self.flushed = true;

        let mut batch = std::mem::take(&mut self.pending);
        batch.sort();
        Some(batch)
    }

    /// Absorb batches from the queue until one quiet interval passes after
    /// the last arrival.
    ///
    /// Returns `false` if the queue closed before anything was buffered.
    /// Cancel safe: dropping the future keeps everything buffered so far.
    pub async fn wait_quiet(&mut self, batches: &mut mpsc::Receiver<Vec<String>>) -> bool {
        loop {
            let Some(deadline) = self.deadline else {
                match batches.recv().await {
                    Some(paths) => {
                        self.on_batch(paths);
                        continue;
                    }
                    None => return false,
                }
            };

            tokio::select! {
                received = batches.recv() => match received {
                    Some(paths) => {
                        self.on_batch(paths);
                    }
                    None => {
                        // No more arrivals possible; still honour the quiet period
                        tokio::time::sleep_until(deadline).await;
                        return true;
                    }
                },
                _ = tokio::time::sleep_until(deadline) => return true,
            }
        }
    }

    /// Wait out the quiet interval and take the sorted batch.
    ///
    /// The queue stays open, so batches arriving while the caller processes
    /// the result wait for the next cycle.
    pub async fn collect(&mut self, batches: &mut mpsc::Receiver<Vec<String>>) -> Option<Vec<String>> {
        self.wait_quiet(batches).await;
        self.take_batch()
    }

    /// Wait out the quiet interval, then close the queue and take the sorted
    /// batch. Senders are only acknowledged while the queue is open, so every
    /// acknowledged path ends up in the returned batch.
    pub async fn collect_final(
        &mut self,
        batches: &mut mpsc::Receiver<Vec<String>>,
    ) -> Option<Vec<String>> {
        self.wait_quiet(batches).await;
        self.seal(batches).await;
        self.take_batch()
    }

    /// Close the queue and buffer whatever was accepted before it closed.
    ///
    /// A send already holding a permit still lands, so the queue is drained
    /// until it reports closed rather than just empty.
    pub async fn seal(&mut self, batches: &mut mpsc::Receiver<Vec<String>>) {
        batches.close();
        while let Some(paths) = batches.recv().await {
            self.on_batch(paths);
        }
    }

    fn take_batch(&mut self) -> Option<Vec<String>> {
        let batch = self.on_timer_fire()?;
        info!(count = batch.len(), "Quiet interval elapsed, flushing batch");
        Some(batch)
    }
}
