//! # Rate Limiting Port
//!
//! Token bucket rate limiter consulted by publish paths and adapters
//! before handing work to the pool. The bus only depends on the
//! [`RateLimit`] trait; the bundled [`TokenBucket`] is one policy.

use crate::errors::BusError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Blocking and non-blocking admission decisions.
#[async_trait]
pub trait RateLimit: Send + Sync {
    /// Wait until a token is available.
    ///
    /// Returns an error only when the limiter can prove no token will ever
    /// become available.
    async fn wait(&self) -> Result<(), BusError>;

    /// Try to take a token without waiting.
    fn allow(&self) -> bool;
}

/// Token bucket rate limiter.
///
/// # Algorithm
///
/// - Tokens are added at a fixed rate
/// - Each request consumes one token
/// - Non-blocking requests are rejected when no tokens are available
pub struct TokenBucket {
    /// Maximum tokens in bucket.
    capacity: u64,
    /// Tokens to add per second.
    refill_rate: u64,
    /// Current token count.
    tokens: AtomicU64,
    /// Last refill time.
    last_refill: parking_lot::Mutex<Instant>,
}

impl TokenBucket {
    /// Create a new token bucket.
    ///
    /// # Parameters
    ///
    /// - `capacity`: Maximum burst size
    /// - `refill_rate`: Tokens per second
    #[must_use]
    pub fn new(capacity: u64, refill_rate: u64) -> Self {
        Self {
            capacity,
            refill_rate,
            tokens: AtomicU64::new(capacity),
            last_refill: parking_lot::Mutex::new(Instant::now()),
        }
    }

    /// Try to acquire a token.
    ///
    /// Returns `true` if the request is allowed, `false` if rate limited.
    pub fn try_acquire(&self) -> bool {
        self.refill();

        loop {
            let current = self.tokens.load(Ordering::Relaxed);
            if current == 0 {
                return false;
            }

            if self
                .tokens
                .compare_exchange(current, current - 1, Ordering::SeqCst, Ordering::Relaxed)
                .is_ok()
            {
                return true;
            }
        }
    }

    /// Refill tokens based on elapsed time.
    fn refill(&self) {
        let mut last = self.last_refill.lock();
        let now = Instant::now();
        let elapsed = now.duration_since(*last);

        let tokens_to_add = (elapsed.as_secs_f64() * self.refill_rate as f64) as u64;

        if tokens_to_add > 0 {
            *last = now;

            loop {
                let current = self.tokens.load(Ordering::Relaxed);
                let new_value = (current + tokens_to_add).min(self.capacity);

                if self
                    .tokens
                    .compare_exchange(current, new_value, Ordering::SeqCst, Ordering::Relaxed)
                    .is_ok()
                {
                    break;
                }
            }
        }
    }

    /// Get current available tokens.
    pub fn available(&self) -> u64 {
        self.refill();
        self.tokens.load(Ordering::Relaxed)
    }

    /// Interval between successive token arrivals.
    fn token_interval(&self) -> Duration {
        // Poll at token-arrival granularity, capped so coarse rates still
        // observe refills promptly.
        Duration::from_millis((1000 / self.refill_rate.max(1)).clamp(1, 100))
    }
}

#[async_trait]
impl RateLimit for TokenBucket {
    async fn wait(&self) -> Result<(), BusError> {
        loop {
            if self.try_acquire() {
                return Ok(());
            }
            if self.refill_rate == 0 {
                // An empty bucket with no refill never recovers.
                return Err(BusError::RateLimited);
            }
            tokio::time::sleep(self.token_interval()).await;
        }
    }

    fn allow(&self) -> bool {
        self.try_acquire()
    }
}
