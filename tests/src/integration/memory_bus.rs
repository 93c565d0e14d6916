//! End-to-end flows through the in-process bus: publish, fan-out, per-key
//! ordering across topics sharing one pool.

#![cfg(test)]

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use strand_memory::MemoryBus;
use strand_pool::{PoolConfig, WorkerPool};
use strand_types::{handler_fn, EventBus, Message, SubscribeOptions, TokenBucket};

fn shared_pool() -> Arc<WorkerPool> {
    Arc::new(WorkerPool::with_config(PoolConfig {
        workers: 4,
        ..PoolConfig::default()
    }))
}

#[tokio::test]
async fn two_topics_share_one_pool() {
    let pool = shared_pool();
    let bus = MemoryBus::new(pool.clone());

    let received: Arc<Mutex<HashMap<String, usize>>> = Arc::new(Mutex::new(HashMap::new()));
    for topic in ["orders", "payments"] {
        let received = received.clone();
        let handler = handler_fn(move |ctx, _payload| {
            let received = received.clone();
            async move {
                *received.lock().entry(ctx.topic().to_string()).or_insert(0) += 1;
                Ok(())
            }
        });
        bus.subscribe(topic, SubscribeOptions::default(), handler)
            .await
            .unwrap();
    }

    for _ in 0..10 {
        bus.publish(Message::new("orders", Vec::new())).await.unwrap();
        bus.publish(Message::new("payments", Vec::new()))
            .await
            .unwrap();
    }

    tokio::time::sleep(Duration::from_millis(200)).await;
    let received = received.lock();
    assert_eq!(received["orders"], 10);
    assert_eq!(received["payments"], 10);
    assert_eq!(pool.metrics().processed, 20);
    pool.close().await;
}

#[tokio::test]
async fn per_entity_ordering_with_concurrent_publishers() {
    let pool = shared_pool();
    let bus = Arc::new(MemoryBus::new(pool.clone()));

    let logs: Arc<Mutex<HashMap<String, Vec<u32>>>> = Arc::new(Mutex::new(HashMap::new()));
    let sink = logs.clone();
    let handler = handler_fn(move |ctx, payload: Vec<u8>| {
        let sink = sink.clone();
        async move {
            let seq = u32::from_be_bytes(payload.try_into().unwrap());
            sink.lock()
                .entry(ctx.key().unwrap().to_string())
                .or_default()
                .push(seq);
            Ok(())
        }
    });
    bus.subscribe("accounts", SubscribeOptions::default(), handler)
        .await
        .unwrap();

    // One publisher task per entity; each publishes its sequence in order.
    let mut publishers = Vec::new();
    for entity in 0..4u32 {
        let bus = bus.clone();
        publishers.push(tokio::spawn(async move {
            for seq in 0..25u32 {
                let message = Message::new("accounts", seq.to_be_bytes().to_vec())
                    .with_key(format!("acct-{entity}"));
                bus.publish(message).await.unwrap();
            }
        }));
    }
    for publisher in publishers {
        publisher.await.unwrap();
    }

    for _ in 0..100 {
        if pool.metrics().processed >= 100 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let logs = logs.lock();
    for entity in 0..4u32 {
        let expected: Vec<u32> = (0..25).collect();
        assert_eq!(logs[&format!("acct-{entity}")], expected);
    }
    pool.close().await;
}

#[tokio::test]
async fn handler_errors_are_counted_not_propagated() {
    let pool = shared_pool();
    let bus = MemoryBus::new(pool.clone());

    let handler = handler_fn(|_ctx, _payload| async {
        Err(strand_types::BusError::Handler("always fails".to_string()))
    });
    bus.subscribe("orders", SubscribeOptions::default(), handler)
        .await
        .unwrap();

    // Publish succeeds even though every handler invocation fails.
    bus.publish(Message::new("orders", Vec::new())).await.unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    let snapshot = pool.metrics();
    assert_eq!(snapshot.handler_errors, 1);
    assert_eq!(snapshot.processed, 1);
    pool.close().await;
}

#[tokio::test]
async fn rate_limited_publish_still_delivers() {
    let pool = shared_pool();
    let limiter = Arc::new(TokenBucket::new(2, 100));
    let bus = MemoryBus::new(pool.clone()).with_rate_limit(limiter);

    let hits = Arc::new(AtomicUsize::new(0));
    let counted = hits.clone();
    let handler = handler_fn(move |_ctx, _payload| {
        let counted = counted.clone();
        async move {
            counted.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    });
    bus.subscribe("orders", SubscribeOptions::default(), handler)
        .await
        .unwrap();

    // Burst past the bucket capacity; publishes wait for refill instead of
    // failing.
    for _ in 0..5 {
        bus.publish(Message::new("orders", Vec::new())).await.unwrap();
    }

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(hits.load(Ordering::SeqCst), 5);
    pool.close().await;
}
