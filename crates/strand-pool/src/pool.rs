//! # Worker Pool
//!
//! Owns the worker set, the dispatcher, and the shared intake queue.
//! Adapters hold only a reference to [`WorkerPool::submit`]; they never
//! reach into worker internals.

use crate::dispatcher::Dispatcher;
use crate::metrics::{MetricsSnapshot, PoolMetrics};
use crate::work_item::WorkItem;
use crate::worker::Worker;
use crate::{DEFAULT_QUEUE_MULTIPLIER, DEFAULT_SUBMIT_WARN_TIMEOUT, WORKER_INBOX_CAPACITY};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{SendTimeoutError, TrySendError};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Pool sizing and backpressure settings.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Worker count. `0` derives one from available parallelism.
    pub workers: usize,

    /// Intake queue capacity as a multiple of the worker count.
    pub queue_multiplier: usize,

    /// Bounded wait on a full intake queue before the backpressure warning
    /// and the fallback blocking send.
    pub submit_warn_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            queue_multiplier: DEFAULT_QUEUE_MULTIPLIER,
            submit_warn_timeout: DEFAULT_SUBMIT_WARN_TIMEOUT,
        }
    }
}

/// The unified worker pool shared by every topic and transport.
///
/// Steady state is `workers + 1` tasks: the workers plus one dispatcher.
/// Safe for concurrent `submit` calls from any number of adapters.
pub struct WorkerPool {
    intake: mpsc::Sender<WorkItem>,
    worker_count: usize,
    shutdown: CancellationToken,
    quits: Mutex<Vec<oneshot::Sender<()>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    metrics: Arc<PoolMetrics>,
    submit_warn_timeout: Duration,
}

impl WorkerPool {
    /// Create a pool with default configuration.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(PoolConfig::default())
    }

    /// Create a pool with explicit configuration.
    #[must_use]
    pub fn with_config(config: PoolConfig) -> Self {
        let worker_count = if config.workers == 0 {
            default_worker_count()
        } else {
            config.workers
        };
        let queue_capacity = worker_count * config.queue_multiplier.max(1);

        let (intake_tx, intake_rx) = mpsc::channel(queue_capacity);
        let shutdown = CancellationToken::new();
        let metrics = Arc::new(PoolMetrics::default());

        let mut inboxes = Vec::with_capacity(worker_count);
        let mut quits = Vec::with_capacity(worker_count);
        let mut tasks = Vec::with_capacity(worker_count + 1);

        for id in 0..worker_count {
            let (inbox_tx, inbox_rx) = mpsc::channel(WORKER_INBOX_CAPACITY);
            let (quit_tx, quit_rx) = oneshot::channel();
            let worker = Worker::new(id, inbox_rx, quit_rx, shutdown.clone(), metrics.clone());
            tasks.push(tokio::spawn(worker.run()));
            inboxes.push(inbox_tx);
            quits.push(quit_tx);
        }

        let dispatcher = Dispatcher::new(intake_rx, inboxes, shutdown.clone(), metrics.clone());
        tasks.push(tokio::spawn(dispatcher.run()));

        info!(
            workers = worker_count,
            queue_capacity, "Worker pool started"
        );

        Self {
            intake: intake_tx,
            worker_count,
            shutdown,
            quits: Mutex::new(quits),
            tasks: Mutex::new(tasks),
            metrics,
            submit_warn_timeout: config.submit_warn_timeout,
        }
    }

    /// Number of workers in the pool.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Snapshot of the pool counters.
    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Submit one item for dispatch.
    ///
    /// Admission control: a non-blocking send, then a bounded wait, then a
    /// logged **blocking** send. Work is never dropped; sustained overload
    /// surfaces as caller latency. Returns `false` only when the pool has
    /// been closed.
    pub async fn submit(&self, item: WorkItem) -> bool {
        self.metrics.incr_submitted();

        let item = match self.intake.try_send(item) {
            Ok(()) => return true,
            Err(TrySendError::Closed(_)) => return false,
            Err(TrySendError::Full(item)) => item,
        };

        let item = match self
            .intake
            .send_timeout(item, self.submit_warn_timeout)
            .await
        {
            Ok(()) => return true,
            Err(SendTimeoutError::Closed(_)) => return false,
            Err(SendTimeoutError::Timeout(item)) => item,
        };

        self.metrics.incr_backpressure_waits();
        warn!(
            topic = %item.topic,
            waited_ms = self.submit_warn_timeout.as_millis() as u64,
            "Intake queue full, blocking until space frees"
        );
        self.intake.send(item).await.is_ok()
    }

    /// Shut the pool down.
    ///
    /// Stops the dispatcher, fires every worker's quit signal, and waits
    /// for all tasks to exit. Workers finish their current item first;
    /// items still queued in inboxes are dropped (durable transports
    /// redeliver them). Call at most once.
    pub async fn close(&self) {
        self.shutdown.cancel();
        for quit in self.quits.lock().drain(..) {
            let _ = quit.send(());
        }

        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            let _ = task.await;
        }
        info!(workers = self.worker_count, "Worker pool closed");
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new()
    }
}

/// Twice the available parallelism, matching an I/O-leaning handler mix.
fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get() * 2)
        .unwrap_or(4)
}
