//! # Pool Metrics
//!
//! Atomic counters for the pool hot path. Counters only, no timings; the
//! operator-facing exporter lives outside this crate.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters owned by one pool instance.
#[derive(Debug, Default)]
pub struct PoolMetrics {
    submitted: AtomicU64,
    dispatched: AtomicU64,
    processed: AtomicU64,
    handler_errors: AtomicU64,
    panics_recovered: AtomicU64,
    acks_failed: AtomicU64,
    backpressure_waits: AtomicU64,
}

impl PoolMetrics {
    pub(crate) fn incr_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn incr_dispatched(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn incr_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn incr_handler_errors(&self) {
        self.handler_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn incr_panics_recovered(&self) {
        self.panics_recovered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn incr_acks_failed(&self) {
        self.acks_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn incr_backpressure_waits(&self) {
        self.backpressure_waits.fetch_add(1, Ordering::Relaxed);
    }

    /// Consistent-enough snapshot of all counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            handler_errors: self.handler_errors.load(Ordering::Relaxed),
            panics_recovered: self.panics_recovered.load(Ordering::Relaxed),
            acks_failed: self.acks_failed.load(Ordering::Relaxed),
            backpressure_waits: self.backpressure_waits.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of [`PoolMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Items accepted by `submit`.
    pub submitted: u64,
    /// Items routed by the dispatcher.
    pub dispatched: u64,
    /// Items whose handler ran to completion (success or error).
    pub processed: u64,
    /// Handlers that returned an error.
    pub handler_errors: u64,
    /// Handlers that panicked and were recovered.
    pub panics_recovered: u64,
    /// Acknowledgment callbacks that failed.
    pub acks_failed: u64,
    /// Submissions that exhausted the bounded wait and fell back to a
    /// blocking send.
    pub backpressure_waits: u64,
}
