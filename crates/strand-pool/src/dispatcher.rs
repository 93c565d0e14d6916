//! # Dispatcher
//!
//! The single routing task. Drains the shared intake queue in FIFO order
//! and places each item on exactly one worker inbox. Serializing the
//! routing decision here is what lets keyed routing stay lock-free.

use crate::metrics::PoolMetrics;
use crate::work_item::WorkItem;
use parking_lot::Mutex;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Stable worker index for a key.
///
/// `DefaultHasher::new()` hashes with fixed keys, so the mapping holds for
/// the lifetime of the pool (and across pools of equal size).
pub(crate) fn worker_index(key: &str, worker_count: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    (hasher.finish() % worker_count as u64) as usize
}

pub(crate) struct Dispatcher {
    intake: mpsc::Receiver<WorkItem>,
    inboxes: Vec<mpsc::Sender<WorkItem>>,
    /// Rotating start position for unkeyed routing.
    cursor: Mutex<usize>,
    shutdown: CancellationToken,
    metrics: Arc<PoolMetrics>,
}

impl Dispatcher {
    pub(crate) fn new(
        intake: mpsc::Receiver<WorkItem>,
        inboxes: Vec<mpsc::Sender<WorkItem>>,
        shutdown: CancellationToken,
        metrics: Arc<PoolMetrics>,
    ) -> Self {
        Self {
            intake,
            inboxes,
            cursor: Mutex::new(0),
            shutdown,
            metrics,
        }
    }

    /// Route items until the pool shuts down.
    pub(crate) async fn run(mut self) {
        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                maybe_item = self.intake.recv() => match maybe_item {
                    Some(item) => self.route(item).await,
                    None => break,
                },
            }
        }
        debug!("Dispatcher stopped");
    }

    async fn route(&self, item: WorkItem) {
        self.metrics.incr_dispatched();

        match item.routing_key() {
            Some(key) => {
                let index = worker_index(key, self.inboxes.len());
                trace!(topic = %item.topic, key = %key, worker = index, "Routing keyed item");
                self.route_keyed(index, item).await;
            }
            None => self.route_unkeyed(item).await,
        }
    }

    /// Keyed items go to their hashed worker, full inbox or not. Rerouting
    /// would break arrival order for the key, so a full inbox blocks the
    /// dispatcher instead.
    async fn route_keyed(&self, index: usize, item: WorkItem) {
        match self.inboxes[index].try_send(item) {
            Ok(()) => {}
            Err(TrySendError::Full(item)) => {
                let _ = self.inboxes[index].send(item).await;
            }
            Err(TrySendError::Closed(item)) => {
                debug!(topic = %item.topic, worker = index, "Worker inbox closed, item dropped");
            }
        }
    }

    /// Unkeyed items take the first free inbox starting at the cursor,
    /// blocking on the cursor's own worker only when every inbox is full.
    async fn route_unkeyed(&self, item: WorkItem) {
        let worker_count = self.inboxes.len();
        let start = {
            let mut cursor = self.cursor.lock();
            let start = *cursor;
            *cursor = (start + 1) % worker_count;
            start
        };

        let mut item = item;
        for offset in 0..worker_count {
            let index = (start + offset) % worker_count;
            match self.inboxes[index].try_send(item) {
                Ok(()) => return,
                Err(TrySendError::Full(rejected)) | Err(TrySendError::Closed(rejected)) => {
                    item = rejected;
                }
            }
        }

        let _ = self.inboxes[start].send(item).await;
    }
}
