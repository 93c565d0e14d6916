//! # Strand Pool Benchmarks
//!
//! Dispatch throughput for the two routing policies:
//!
//! | Path | Target |
//! |------|--------|
//! | Unkeyed round-robin | > 100k items/sec |
//! | Keyed hash routing  | > 100k items/sec across distinct keys |

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use strand_pool::{PoolConfig, WorkItem, WorkerPool};
use strand_types::handler_fn;
use tokio::runtime::Runtime;

fn bench_pool(c: &mut Criterion, name: &str, key_of: fn(usize) -> Option<String>) {
    let rt = Runtime::new().expect("runtime");
    let mut group = c.benchmark_group("pool-dispatch");

    for batch in [100usize, 1000] {
        group.throughput(Throughput::Elements(batch as u64));
        group.bench_with_input(BenchmarkId::new(name, batch), &batch, |b, &batch| {
            b.iter(|| {
                rt.block_on(async {
                    let pool = WorkerPool::with_config(PoolConfig {
                        workers: 4,
                        ..PoolConfig::default()
                    });
                    let done = Arc::new(AtomicUsize::new(0));

                    for n in 0..batch {
                        let done = done.clone();
                        let handler = handler_fn(move |_ctx, _payload| {
                            let done = done.clone();
                            async move {
                                done.fetch_add(1, Ordering::Relaxed);
                                Ok(())
                            }
                        });
                        let mut item = WorkItem::new("bench", Vec::new(), handler);
                        if let Some(key) = key_of(n) {
                            item = item.with_key(key);
                        }
                        let accepted = pool.submit(item).await;
                        assert!(accepted);
                    }

                    while done.load(Ordering::Relaxed) < batch {
                        tokio::task::yield_now().await;
                    }
                    pool.close().await;
                });
            });
        });
    }
    group.finish();
}

fn bench_unkeyed_dispatch(c: &mut Criterion) {
    bench_pool(c, "unkeyed", |_n| None);
}

fn bench_keyed_dispatch(c: &mut Criterion) {
    // 16 distinct keys keeps every worker busy without serializing the run.
    bench_pool(c, "keyed", |n| Some(format!("key-{}", n % 16)));
}

criterion_group!(benches, bench_unkeyed_dispatch, bench_keyed_dispatch);
criterion_main!(benches);
