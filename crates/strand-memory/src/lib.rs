//! # Strand Memory - In-Process Fan-Out
//!
//! The brokerless backend: publish fans out to every handler registered
//! for the topic, asynchronously, through the shared worker pool. Per-key
//! ordering holds exactly as it does for the durable transports because
//! delivery goes through the same dispatcher.
//!
//! There is no backing log, so there is no acknowledgment and no
//! redelivery: a handler error is logged and counted by the pool, nothing
//! more. Suitable for single-process deployments and tests.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use strand_pool::{WorkItem, WorkerPool};
use strand_types::{
    BusError, EventBus, Message, MessageHandler, RateLimit, SubscribeOptions, SubscriptionHandle,
};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

/// One registered handler for a topic.
struct Registration {
    id: Uuid,
    handler: Arc<dyn MessageHandler>,
    token: CancellationToken,
}

/// In-process implementation of the event bus.
///
/// Handlers are registered per topic; publish submits one pool item per
/// live registration. Single-node only; distributed deployments use the
/// Kafka or JetStream backends.
pub struct MemoryBus {
    pool: Arc<WorkerPool>,
    registry: RwLock<HashMap<String, Vec<Registration>>>,
    rate_limit: Option<Arc<dyn RateLimit>>,
    published: AtomicU64,
}

impl MemoryBus {
    /// Create a bus delivering through the given pool.
    #[must_use]
    pub fn new(pool: Arc<WorkerPool>) -> Self {
        Self {
            pool,
            registry: RwLock::new(HashMap::new()),
            rate_limit: None,
            published: AtomicU64::new(0),
        }
    }

    /// Consult a rate limiter before every publish.
    #[must_use]
    pub fn with_rate_limit(mut self, limiter: Arc<dyn RateLimit>) -> Self {
        self.rate_limit = Some(limiter);
        self
    }

    /// Total messages published.
    #[must_use]
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Number of live registrations for a topic.
    pub async fn subscriber_count(&self, topic: &str) -> usize {
        self.registry
            .read()
            .await
            .get(topic)
            .map(|registrations| {
                registrations
                    .iter()
                    .filter(|r| !r.token.is_cancelled())
                    .count()
            })
            .unwrap_or(0)
    }
}

#[async_trait]
impl EventBus for MemoryBus {
    async fn publish(&self, message: Message) -> Result<(), BusError> {
        if let Some(limiter) = &self.rate_limit {
            limiter.wait().await?;
        }
        self.published.fetch_add(1, Ordering::Relaxed);

        let key = message.ordering_key().map(str::to_string);
        let mut delivered = 0usize;
        {
            // Prune cancelled registrations while fanning out.
            let mut registry = self.registry.write().await;
            if let Some(registrations) = registry.get_mut(&message.topic) {
                registrations.retain(|r| !r.token.is_cancelled());
                for registration in registrations.iter() {
                    let mut item = WorkItem::new(
                        message.topic.clone(),
                        message.payload.clone(),
                        registration.handler.clone(),
                    );
                    if let Some(key) = key.clone() {
                        item = item.with_key(key);
                    }
                    if !self.pool.submit(item).await {
                        return Err(BusError::Closed);
                    }
                    delivered += 1;
                }
            }
        }

        if delivered == 0 {
            warn!(topic = %message.topic, "Message dropped (no subscribers)");
        } else {
            debug!(topic = %message.topic, receivers = delivered, "Message published");
        }
        Ok(())
    }

    async fn subscribe(
        &self,
        topic: &str,
        _options: SubscribeOptions,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<SubscriptionHandle, BusError> {
        let token = CancellationToken::new();
        let registration = Registration {
            id: Uuid::new_v4(),
            handler,
            token: token.clone(),
        };
        debug!(topic = %topic, id = %registration.id, "Handler registered");

        self.registry
            .write()
            .await
            .entry(topic.to_string())
            .or_default()
            .push(registration);

        Ok(SubscriptionHandle::detached(topic, token))
    }
}
