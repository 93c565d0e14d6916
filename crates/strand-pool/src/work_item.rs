//! # Work Item
//!
//! The unit of dispatch: one delivered record plus everything a worker
//! needs to process and acknowledge it.

use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;
use strand_types::{BusError, MessageHandler};

/// Transport-specific acknowledgment callback.
///
/// Invoked exactly once, after the handler has returned, with the handler
/// outcome (`true` = success). The transport decides what to do with a
/// failure: JetStream NAKs for redelivery, Kafka has no per-item callback
/// at all (offsets commit at the session level).
pub type AckFn = Box<dyn FnOnce(bool) -> BoxFuture<'static, Result<(), BusError>> + Send>;

/// One unit of work for the pool.
pub struct WorkItem {
    /// Logical topic, used only for diagnostics inside the pool.
    pub topic: String,

    /// Ordering key. Items sharing a non-empty key are processed strictly
    /// in submission order; everything else runs with maximum parallelism.
    pub key: Option<String>,

    /// Opaque payload handed to the handler.
    pub payload: Vec<u8>,

    /// The subscriber's handler.
    pub handler: Arc<dyn MessageHandler>,

    /// Optional acknowledgment callback.
    pub ack: Option<AckFn>,
}

impl WorkItem {
    /// Create an unkeyed, unacknowledged work item.
    pub fn new(
        topic: impl Into<String>,
        payload: Vec<u8>,
        handler: Arc<dyn MessageHandler>,
    ) -> Self {
        Self {
            topic: topic.into(),
            key: None,
            payload,
            handler,
            ack: None,
        }
    }

    /// Attach an ordering key.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Attach an acknowledgment callback.
    #[must_use]
    pub fn with_ack(mut self, ack: AckFn) -> Self {
        self.ack = Some(ack);
        self
    }

    /// The key the dispatcher routes on: `None` when absent or empty, so
    /// an empty string never pins items to one worker.
    pub(crate) fn routing_key(&self) -> Option<&str> {
        self.key.as_deref().filter(|k| !k.is_empty())
    }
}

impl fmt::Debug for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkItem")
            .field("topic", &self.topic)
            .field("key", &self.key)
            .field("payload_len", &self.payload.len())
            .field("has_ack", &self.ack.is_some())
            .finish()
    }
}
