//! # Backlog Detection Port
//!
//! Observes transport-level lag independently of the pool. Adapters report
//! lag samples; operators poll the verdict. Never on the per-message hot
//! path.

use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::warn;

/// Consumer of transport lag observations.
pub trait BacklogDetector: Send + Sync {
    /// Record the current lag for a topic (messages not yet consumed).
    fn record_lag(&self, topic: &str, lag: u64);

    /// Whether the topic is currently considered backlogged.
    fn is_backlogged(&self, topic: &str) -> bool;
}

/// Backlog detector that flags topics whose last observed lag exceeds a
/// fixed threshold.
pub struct LagThresholdDetector {
    threshold: u64,
    lags: RwLock<HashMap<String, u64>>,
}

impl LagThresholdDetector {
    /// Create a detector with a lag threshold in messages.
    #[must_use]
    pub fn new(threshold: u64) -> Self {
        Self {
            threshold,
            lags: RwLock::new(HashMap::new()),
        }
    }

    /// Last recorded lag for a topic.
    #[must_use]
    pub fn lag(&self, topic: &str) -> Option<u64> {
        self.lags.read().get(topic).copied()
    }
}

impl BacklogDetector for LagThresholdDetector {
    fn record_lag(&self, topic: &str, lag: u64) {
        if lag > self.threshold {
            warn!(topic = %topic, lag, threshold = self.threshold, "Topic backlogged");
        }
        self.lags.write().insert(topic.to_string(), lag);
    }

    fn is_backlogged(&self, topic: &str) -> bool {
        self.lag(topic).is_some_and(|lag| lag > self.threshold)
    }
}
