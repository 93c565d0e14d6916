//! # Strand Kafka - Consumer-Group Backend
//!
//! Durable broker backend with rebalancing consumer groups. One consume
//! loop task per subscribed topic feeds the shared pool; the record key
//! becomes the pool's ordering key, so per-key order survives end to end
//! within a partition.
//!
//! ## Acknowledgment model
//!
//! Offsets are committed asynchronously at the session level
//! (`enable.auto.commit`), not per message: a record counts as consumed
//! whether or not its handler succeeded. This is deliberately different
//! from the JetStream backend's per-message ack — at-least-once here
//! means "at least once per session", and a handler error alone never
//! triggers redelivery. Work items therefore carry no ack callback.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use rdkafka::Message as KafkaRecord;
use std::sync::Arc;
use std::time::Duration;
use strand_pool::{WorkItem, WorkerPool};
use strand_types::{
    BusError, EventBus, Message, MessageHandler, RateLimit, SubscribeOptions, SubscriptionHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

/// Wait before retrying a failed consume loop iteration.
const CONSUME_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Producer send timeout.
const PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);

/// Kafka implementation of the event bus.
///
/// Construction takes an already-translated [`ClientConfig`]
/// (`bootstrap.servers` at minimum); broker bootstrapping and
/// topic provisioning happen outside this crate.
pub struct KafkaBus {
    pool: Arc<WorkerPool>,
    producer: FutureProducer,
    consumer_config: ClientConfig,
    rate_limit: Option<Arc<dyn RateLimit>>,
}

impl KafkaBus {
    /// Create a bus over the given client configuration.
    pub fn new(client_config: ClientConfig, pool: Arc<WorkerPool>) -> Result<Self, BusError> {
        let producer: FutureProducer = client_config
            .create()
            .map_err(|err| BusError::Connection(err.to_string()))?;
        Ok(Self {
            pool,
            producer,
            consumer_config: client_config,
            rate_limit: None,
        })
    }

    /// Consult a rate limiter before every publish.
    #[must_use]
    pub fn with_rate_limit(mut self, limiter: Arc<dyn RateLimit>) -> Self {
        self.rate_limit = Some(limiter);
        self
    }

    /// Build the consumer configuration for one subscription.
    fn consumer_config_for(&self, group: &str) -> ClientConfig {
        let mut config = self.consumer_config.clone();
        config
            .set("group.id", group)
            // Session-level commit model, see the crate docs.
            .set("enable.auto.commit", "true")
            .set("auto.offset.reset", "earliest");
        config
    }
}

#[async_trait]
impl EventBus for KafkaBus {
    async fn publish(&self, message: Message) -> Result<(), BusError> {
        if let Some(limiter) = &self.rate_limit {
            limiter.wait().await?;
        }

        let mut record: FutureRecord<'_, str, Vec<u8>> =
            FutureRecord::to(&message.topic).payload(&message.payload);
        if let Some(key) = message.ordering_key() {
            record = record.key(key);
        }

        self.producer
            .send(record, Timeout::After(PUBLISH_TIMEOUT))
            .await
            .map_err(|(err, _record)| BusError::publish(&message.topic, err))?;
        Ok(())
    }

    async fn subscribe(
        &self,
        topic: &str,
        options: SubscribeOptions,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<SubscriptionHandle, BusError> {
        let group = options
            .group
            .clone()
            .unwrap_or_else(|| derived_group_name(topic));
        let consumer: StreamConsumer = self
            .consumer_config_for(&group)
            .create()
            .map_err(|err| BusError::subscribe(topic, err))?;
        consumer
            .subscribe(&[topic])
            .map_err(|err| BusError::subscribe(topic, err))?;

        info!(topic = %topic, group = %group, "Kafka subscription started");

        let token = CancellationToken::new();
        let task = tokio::spawn(consume_loop(
            consumer,
            topic.to_string(),
            handler,
            self.pool.clone(),
            token.clone(),
        ));
        Ok(SubscriptionHandle::new(topic, token, task))
    }
}

/// Drive one consumer until the subscription is cancelled.
///
/// Consume errors are transient in a rebalancing group (broker failover,
/// partition reassignment), so the loop sleeps and retries instead of
/// terminating the subscription.
async fn consume_loop(
    consumer: StreamConsumer,
    topic: String,
    handler: Arc<dyn MessageHandler>,
    pool: Arc<WorkerPool>,
    token: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            result = consumer.recv() => match result {
                Ok(record) => {
                    let (key, payload) = record_parts(&record);
                    let mut item = WorkItem::new(topic.clone(), payload, handler.clone());
                    if let Some(key) = key {
                        item = item.with_key(key);
                    }
                    if !pool.submit(item).await {
                        warn!(topic = %topic, "Pool closed, stopping Kafka consume loop");
                        break;
                    }
                }
                Err(err) => {
                    warn!(topic = %topic, error = %err, "Kafka consume error, retrying");
                    tokio::time::sleep(CONSUME_RETRY_DELAY).await;
                }
            },
        }
    }
    info!(topic = %topic, "Kafka consume loop stopped");
}

/// Extract the ordering key and payload from a record.
///
/// Keys are treated as UTF-8; an empty or absent key yields `None` and
/// round-robin dispatch.
fn record_parts<M: KafkaRecord>(record: &M) -> (Option<String>, Vec<u8>) {
    let key = record
        .key()
        .map(|k| String::from_utf8_lossy(k).into_owned())
        .filter(|k| !k.is_empty());
    let payload = record.payload().map(<[u8]>::to_vec).unwrap_or_default();
    (key, payload)
}

/// Per-subscription group name when the caller did not pick one.
///
/// A unique group means no load sharing with other subscribers, matching
/// the in-process backend's fan-out behavior.
fn derived_group_name(topic: &str) -> String {
    format!("strand-{}-{}", topic, Uuid::new_v4().simple())
}
