//! # Strand NATS - JetStream Pull Backend
//!
//! Durable-log backend with explicit per-message acknowledgment. Each
//! subscription drives a pull consumer: fetch a small batch with a
//! bounded wait, submit every message to the shared pool, repeat until
//! cancelled.
//!
//! ## Acknowledgment model
//!
//! Each work item's ack callback is wired to its own JetStream message:
//! handler success acks, handler failure (or panic) NAKs, and the server
//! redelivers un-acked messages after `ack_wait`, up to the consumer's
//! `max_deliver`. This is the per-message half of the acknowledgment
//! asymmetry; the Kafka backend commits at the session level instead.
//!
//! ## Ordering key
//!
//! NATS subjects have no record key, so the publish path carries the
//! ordering key in the `Strand-Key` header and the consume loop reads it
//! back.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use async_nats::jetstream;
use async_nats::jetstream::consumer::pull::Config as PullConfig;
use async_nats::jetstream::consumer::Consumer;
use async_nats::jetstream::AckKind;
use async_trait::async_trait;
use futures::{FutureExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use strand_pool::{AckFn, WorkItem, WorkerPool};
use strand_types::{
    BusError, EventBus, Message, MessageHandler, RateLimit, SubscribeOptions, SubscriptionHandle,
    TopicConfig,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

/// Header carrying the ordering key across the wire.
pub const KEY_HEADER: &str = "Strand-Key";

/// Messages fetched per pull request.
const FETCH_BATCH: usize = 16;

/// Bounded wait for a pull request to fill.
const FETCH_WAIT: Duration = Duration::from_secs(5);

/// Wait before retrying a failed fetch.
const FETCH_RETRY_DELAY: Duration = Duration::from_secs(1);

/// JetStream implementation of the event bus.
///
/// Takes an already-connected client; server bootstrapping happens
/// outside this crate.
pub struct NatsBus {
    pool: Arc<WorkerPool>,
    jetstream: jetstream::Context,
    rate_limit: Option<Arc<dyn RateLimit>>,
}

impl NatsBus {
    /// Create a bus over a connected NATS client.
    #[must_use]
    pub fn new(client: async_nats::Client, pool: Arc<WorkerPool>) -> Self {
        Self {
            pool,
            jetstream: jetstream::new(client),
            rate_limit: None,
        }
    }

    /// Consult a rate limiter before every publish.
    #[must_use]
    pub fn with_rate_limit(mut self, limiter: Arc<dyn RateLimit>) -> Self {
        self.rate_limit = Some(limiter);
        self
    }
}

#[async_trait]
impl EventBus for NatsBus {
    async fn publish(&self, message: Message) -> Result<(), BusError> {
        if let Some(limiter) = &self.rate_limit {
            limiter.wait().await?;
        }

        let mut headers = async_nats::HeaderMap::new();
        if let Some(key) = message.ordering_key() {
            headers.insert(KEY_HEADER, key);
        }
        for (name, value) in message.headers.iter().flatten() {
            headers.insert(name.as_str(), value.as_str());
        }

        self.jetstream
            .publish_with_headers(
                message.topic.clone(),
                headers,
                message.payload.clone().into(),
            )
            .await
            .map_err(|err| BusError::publish(&message.topic, err))?
            // Wait for the server to confirm the write.
            .await
            .map_err(|err| BusError::publish(&message.topic, err))?;
        Ok(())
    }

    async fn subscribe(
        &self,
        topic: &str,
        options: SubscribeOptions,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<SubscriptionHandle, BusError> {
        let config = &options.topic_config;
        let stream = self
            .jetstream
            .get_or_create_stream(stream_config(topic, config))
            .await
            .map_err(|err| BusError::subscribe(topic, err))?;

        let name = options
            .group
            .clone()
            .unwrap_or_else(|| derived_consumer_name(topic));
        let consumer = stream
            .get_or_create_consumer(&name, consumer_config(&name, config))
            .await
            .map_err(|err| BusError::subscribe(topic, err))?;

        info!(topic = %topic, consumer = %name, "JetStream subscription started");

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

/// Stream descriptor for a topic.
fn stream_config(topic: &str, config: &TopicConfig) -> jetstream::stream::Config {
    jetstream::stream::Config {
        name: stream_name(topic),
        subjects: vec![topic.to_string()],
        max_age: config.retention().unwrap_or_default(),
        ..Default::default()
    }
}

/// Pull consumer descriptor for one subscription.
fn consumer_config(name: &str, config: &TopicConfig) -> PullConfig {
    PullConfig {
        durable_name: config.durable.then(|| name.to_string()),
        max_deliver: config.max_deliver,
        ack_wait: config.ack_wait(),
        ..Default::default()
    }
}

/// Fetch batches until the subscription is cancelled.
async fn consume_loop(
    consumer: Consumer<PullConfig>,
    topic: String,
    handler: Arc<dyn MessageHandler>,
    pool: Arc<WorkerPool>,
    token: CancellationToken,
) {
    loop {
        let fetched = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            fetched = consumer
                .fetch()
                .max_messages(FETCH_BATCH)
                .expires(FETCH_WAIT)
                .messages() => fetched,
        };

        let mut batch = match fetched {
            Ok(batch) => batch,
            Err(err) => {
                warn!(topic = %topic, error = %err, "JetStream fetch failed, retrying");
                tokio::time::sleep(FETCH_RETRY_DELAY).await;
                continue;
            }
        };

        while let Some(next) = batch.next().await {
            let message = match next {
                Ok(message) => message,
                Err(err) => {
                    warn!(topic = %topic, error = %err, "JetStream batch error");
                    break;
                }
            };

            let key = ordering_key(&message);
            let payload = message.payload.to_vec();
            let mut item = WorkItem::new(topic.clone(), payload, handler.clone());
            if let Some(key) = key {
                item = item.with_key(key);
            }
            let item = item.with_ack(make_ack(message));

            if !pool.submit(item).await {
                warn!(topic = %topic, "Pool closed, stopping JetStream consume loop");
                return;
            }
        }
    }
    info!(topic = %topic, "JetStream consume loop stopped");
}

/// Read the ordering key header, if present and non-empty.
fn ordering_key(message: &jetstream::Message) -> Option<String> {
    message
        .headers
        .as_ref()
        .and_then(|headers| headers.get(KEY_HEADER))
        .map(|value| value.as_str().to_string())
        .filter(|key| !key.is_empty())
}

/// Ack callback for one message: ack on success, NAK on failure.
fn make_ack(message: jetstream::Message) -> AckFn {
    Box::new(move |succeeded| {
        async move {
            let result = if succeeded {
                message.ack().await
            } else {
                // Withhold the ack; NAK requests prompt redelivery.
                message.ack_with(AckKind::Nak(None)).await
            };
            result.map_err(|err| BusError::Ack(err.to_string()))
        }
        .boxed()
    })
}

/// JetStream stream names may not contain subject token separators.
fn stream_name(topic: &str) -> String {
    topic.replace(['.', '*', '>'], "_")
}

/// Per-subscription consumer name when the caller did not pick one.
fn derived_consumer_name(topic: &str) -> String {
    format!("strand-{}-{}", stream_name(topic), Uuid::new_v4().simple())
}
