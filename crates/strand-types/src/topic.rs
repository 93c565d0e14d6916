//! # Topic Configuration
//!
//! Per-topic persistence and partitioning descriptor, resolved before an
//! adapter starts consuming. The pool itself never reads it.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Durability and delivery settings for one topic.
///
/// Transports interpret the fields they understand and ignore the rest:
/// JetStream reads the retention and acknowledgment settings,
/// `partitions`/`replication` describe what out-of-band provisioning gave
/// a partitioned broker, and the in-process bus ignores all of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicConfig {
    /// Partition count for partitioned brokers.
    pub partitions: i32,

    /// Replication factor for partitioned brokers.
    pub replication: i32,

    /// Message retention, in seconds. `None` means broker default.
    pub retention_secs: Option<u64>,

    /// Maximum delivery attempts before a message is parked (pull
    /// transports only).
    pub max_deliver: i64,

    /// How long the transport waits for an ack before redelivering, in
    /// seconds (pull transports only).
    pub ack_wait_secs: u64,

    /// Whether the subscription survives consumer restarts.
    pub durable: bool,
}

impl TopicConfig {
    /// Ack wait as a [`Duration`].
    #[must_use]
    pub fn ack_wait(&self) -> Duration {
        Duration::from_secs(self.ack_wait_secs)
    }

    /// Retention as a [`Duration`], if configured.
    #[must_use]
    pub fn retention(&self) -> Option<Duration> {
        self.retention_secs.map(Duration::from_secs)
    }
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            partitions: 1,
            replication: 1,
            retention_secs: None,
            max_deliver: 5,
            ack_wait_secs: 30,
            durable: true,
        }
    }
}
