//! # Error Types
//!
//! Defines the error taxonomy shared by every transport and the pool.

use thiserror::Error;

/// Errors that can occur when publishing, subscribing, or handling messages.
#[derive(Debug, Clone, Error)]
pub enum BusError {
    /// Failed to publish a message to the transport.
    #[error("failed to publish to {topic}: {reason}")]
    Publish { topic: String, reason: String },

    /// Failed to establish or drive a subscription.
    #[error("failed to subscribe to {topic}: {reason}")]
    Subscribe { topic: String, reason: String },

    /// Transport connection error.
    #[error("connection error: {0}")]
    Connection(String),

    /// Payload could not be serialized or deserialized.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The subscriber's handler returned an error.
    #[error("handler error: {0}")]
    Handler(String),

    /// Acknowledgment of a processed message failed.
    #[error("acknowledgment failed: {0}")]
    Ack(String),

    /// The bus or pool has been closed.
    #[error("bus closed")]
    Closed,

    /// A rate limit policy rejected the operation.
    #[error("rate limited")]
    RateLimited,
}

impl BusError {
    /// Shorthand for a publish failure.
    pub fn publish(topic: impl Into<String>, reason: impl ToString) -> Self {
        Self::Publish {
            topic: topic.into(),
            reason: reason.to_string(),
        }
    }

    /// Shorthand for a subscribe failure.
    pub fn subscribe(topic: impl Into<String>, reason: impl ToString) -> Self {
        Self::Subscribe {
            topic: topic.into(),
            reason: reason.to_string(),
        }
    }
}
