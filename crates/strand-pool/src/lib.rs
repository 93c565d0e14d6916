//! # Strand Pool - Unified Worker Pool
//!
//! One bounded pool of worker tasks shared by every topic and every
//! transport. Consumption adapters hand records to [`WorkerPool::submit`];
//! a single dispatcher task routes each item to exactly one worker.
//!
//! ## Routing
//!
//! ```text
//!                                ┌──────────────┐
//!                           ┌──► │  worker 0    │  hash(key) % N
//! ┌────────┐   ┌──────────┐ │    └──────────────┘
//! │ submit │──►│ dispatch │─┤    ┌──────────────┐
//! └────────┘   │ (1 task) │ └──► │  worker 1    │  round-robin cursor
//!              └──────────┘      └──────────────┘  (unkeyed items)
//! ```
//!
//! - **Keyed items** always land on `hash(key) % worker_count`. A full
//!   inbox blocks the dispatcher on that worker; a keyed item is never
//!   rerouted, which is what preserves arrival order per key.
//! - **Unkeyed items** start at a rotating cursor and take the first
//!   worker with a free inbox slot, blocking on the cursor's worker only
//!   when every inbox is full.
//!
//! ## Backpressure
//!
//! [`WorkerPool::submit`] never drops work: a full intake queue degrades
//! from a non-blocking send to a bounded wait to a logged, unbounded
//! blocking send.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

mod dispatcher;
mod metrics;
mod pool;
mod work_item;
mod worker;

pub use metrics::{MetricsSnapshot, PoolMetrics};
pub use pool::{PoolConfig, WorkerPool};
pub use work_item::{AckFn, WorkItem};

use std::time::Duration;

/// Intake queue capacity is `worker_count` times this multiplier.
pub const DEFAULT_QUEUE_MULTIPLIER: usize = 10;

/// Depth of each worker's private inbox.
pub const WORKER_INBOX_CAPACITY: usize = 8;

/// Bounded wait before a full intake queue is reported and the submit
/// degrades to a blocking send.
pub const DEFAULT_SUBMIT_WARN_TIMEOUT: Duration = Duration::from_secs(1);
