//! # Message Envelope
//!
//! The single envelope every transport publishes and consumes. Transport
//! adapters translate native records (Kafka messages, JetStream messages)
//! into this shape at the boundary.

use std::collections::HashMap;

/// A message addressed to a logical topic.
///
/// The `key` carries the ordering constraint: messages sharing a non-empty
/// key are processed strictly in arrival order, messages without a key are
/// spread across workers for maximum parallelism.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Logical destination topic.
    pub topic: String,

    /// Optional ordering key (aggregate / entity identifier).
    pub key: Option<String>,

    /// Opaque payload bytes.
    pub payload: Vec<u8>,

    /// Optional transport headers.
    pub headers: Option<HashMap<String, String>>,
}

impl Message {
    /// Create a new message for a topic.
    pub fn new(topic: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            topic: topic.into(),
            key: None,
            payload,
            headers: None,
        }
    }

    /// Attach an ordering key.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Attach a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(HashMap::new)
            .insert(name.into(), value.into());
        self
    }

    /// The effective ordering key: `None` when absent or empty.
    ///
    /// Adapters route on this, so an empty string never creates an
    /// accidental ordering domain.
    #[must_use]
    pub fn ordering_key(&self) -> Option<&str> {
        self.key.as_deref().filter(|k| !k.is_empty())
    }
}
