//! # Event Bus Trait
//!
//! The transport-agnostic surface: publish a [`Message`], subscribe a
//! [`MessageHandler`] to a topic. Implemented by the in-process bus and by
//! each broker adapter so deployments can swap backends via configuration.

use crate::errors::BusError;
use crate::handler::MessageHandler;
use crate::message::Message;
use crate::topic::TopicConfig;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

/// Options applied when registering a subscription.
#[derive(Debug, Clone, Default)]
pub struct SubscribeOptions {
    /// Consumer group / durable name. `None` derives a per-subscription
    /// name, which on grouped transports means no load sharing.
    pub group: Option<String>,

    /// Topic descriptor, resolved before the adapter starts.
    pub topic_config: TopicConfig,
}

impl SubscribeOptions {
    /// Subscribe as a member of a named consumer group.
    #[must_use]
    pub fn group(name: impl Into<String>) -> Self {
        Self {
            group: Some(name.into()),
            topic_config: TopicConfig::default(),
        }
    }

    /// Replace the topic configuration.
    #[must_use]
    pub fn with_topic_config(mut self, config: TopicConfig) -> Self {
        self.topic_config = config;
        self
    }
}

/// A transport-agnostic event bus.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publish a message to its topic.
    async fn publish(&self, message: Message) -> Result<(), BusError>;

    /// Register a handler for a topic.
    ///
    /// Delivery starts immediately; the returned handle stops it.
    async fn subscribe(
        &self,
        topic: &str,
        options: SubscribeOptions,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<SubscriptionHandle, BusError>;
}

/// Handle to an active subscription.
///
/// Cancelling stops the consume loop; messages already handed to the pool
/// still complete. Dropping the handle leaves the subscription running.
pub struct SubscriptionHandle {
    id: Uuid,
    topic: String,
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl SubscriptionHandle {
    /// Create a handle for a consume-loop task.
    #[must_use]
    pub fn new(topic: impl Into<String>, token: CancellationToken, task: JoinHandle<()>) -> Self {
        Self {
            id: Uuid::new_v4(),
            topic: topic.into(),
            token,
            task: Some(task),
        }
    }

    /// Create a handle for a subscription with no consume loop of its own
    /// (the in-process bus delivers directly from the publish path).
    #[must_use]
    pub fn detached(topic: impl Into<String>, token: CancellationToken) -> Self {
        Self {
            id: Uuid::new_v4(),
            topic: topic.into(),
            token,
            task: None,
        }
    }

    /// Unique id of this subscription.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Topic this subscription listens on.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Signal the consume loop to stop without waiting for it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Stop the consume loop and wait for it to exit.
    pub async fn shutdown(mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        debug!(topic = %self.topic, id = %self.id, "Subscription stopped");
    }
}
