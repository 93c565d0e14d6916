//! # Worker
//!
//! One worker task: a bounded inbox drained strictly sequentially, panic
//! recovery around the handler, acknowledgment after the handler returns.

use crate::metrics::PoolMetrics;
use crate::work_item::WorkItem;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// A single pool worker.
///
/// Sequential execution within one worker is what provides the per-key
/// ordering guarantee; the worker itself knows nothing about keys.
pub(crate) struct Worker {
    id: usize,
    inbox: mpsc::Receiver<WorkItem>,
    quit: oneshot::Receiver<()>,
    shutdown: CancellationToken,
    metrics: Arc<PoolMetrics>,
}

impl Worker {
    pub(crate) fn new(
        id: usize,
        inbox: mpsc::Receiver<WorkItem>,
        quit: oneshot::Receiver<()>,
        shutdown: CancellationToken,
        metrics: Arc<PoolMetrics>,
    ) -> Self {
        Self {
            id,
            inbox,
            quit,
            shutdown,
            metrics,
        }
    }

    /// Drain the inbox until quit fires.
    ///
    /// Quit is only observed between items: an item already being
    /// processed always runs to completion, including its acknowledgment.
    pub(crate) async fn run(mut self) {
        loop {
            tokio::select! {
                biased;
                _ = &mut self.quit => break,
                maybe_item = self.inbox.recv() => match maybe_item {
                    Some(item) => self.process(item).await,
                    None => break,
                },
            }
        }
        debug!(worker = self.id, "Worker stopped");
    }

    /// Execute one item: handler with panic protection, then ack.
    async fn process(&self, item: WorkItem) {
        let WorkItem {
            topic,
            key,
            payload,
            handler,
            ack,
        } = item;

        let ctx = strand_types::HandlerContext::new(&topic, key.clone(), self.shutdown.clone());
        let outcome = AssertUnwindSafe(handler.handle(&ctx, &payload))
            .catch_unwind()
            .await;

        self.metrics.incr_processed();
        let succeeded = match outcome {
            Ok(Ok(())) => true,
            Ok(Err(err)) => {
                self.metrics.incr_handler_errors();
                warn!(
                    worker = self.id,
                    topic = %topic,
                    key = key.as_deref().unwrap_or(""),
                    error = %err,
                    "Handler failed"
                );
                false
            }
            Err(panic) => {
                self.metrics.incr_panics_recovered();
                error!(
                    worker = self.id,
                    topic = %topic,
                    key = key.as_deref().unwrap_or(""),
                    panic = panic_message(&panic),
                    "Handler panicked"
                );
                false
            }
        };

        if let Some(ack) = ack {
            if let Err(err) = ack(succeeded).await {
                self.metrics.incr_acks_failed();
                warn!(
                    worker = self.id,
                    topic = %topic,
                    error = %err,
                    "Acknowledgment failed"
                );
            }
        }
    }
}

/// Best-effort extraction of a panic payload for logging.
fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "<non-string panic>"
    }
}
