//! # Handler Contract
//!
//! The subscriber-facing contract: one handler per (topic, group)
//! registered at subscribe time, invoked once per delivered message.

use crate::errors::BusError;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Execution context propagated into every handler invocation.
///
/// Carries the delivery coordinates and a cancellation signal that fires
/// when the owning pool begins shutdown. Long-running handlers may observe
/// it; the pool never aborts a handler mid-flight.
#[derive(Debug, Clone)]
pub struct HandlerContext {
    topic: String,
    key: Option<String>,
    cancellation: CancellationToken,
}

impl HandlerContext {
    /// Create a context scoped to a cancellation token.
    #[must_use]
    pub fn new(
        topic: impl Into<String>,
        key: Option<String>,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            topic: topic.into(),
            key,
            cancellation,
        }
    }

    /// Create a context that is never cancelled (tests, fire-and-forget).
    #[must_use]
    pub fn detached(topic: impl Into<String>, key: Option<String>) -> Self {
        Self::new(topic, key, CancellationToken::new())
    }

    /// Topic the message was delivered on.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Ordering key of the message, if any.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Whether shutdown has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Resolves when shutdown is requested.
    pub async fn cancelled(&self) {
        self.cancellation.cancelled().await;
    }
}

/// A subscriber's message handler.
///
/// Invoked exactly once per delivered message (subject to transport-level
/// redelivery). Returning an error withholds acknowledgment on transports
/// with per-message acks; see the adapter crates for the exact semantics.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Process one message payload.
    async fn handle(&self, ctx: &HandlerContext, payload: &[u8]) -> Result<(), BusError>;
}

/// Adapter that lets a closure serve as a [`MessageHandler`].
struct FnHandler<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> MessageHandler for FnHandler<F>
where
    F: Fn(HandlerContext, Vec<u8>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BusError>> + Send + 'static,
{
    async fn handle(&self, ctx: &HandlerContext, payload: &[u8]) -> Result<(), BusError> {
        (self.f)(ctx.clone(), payload.to_vec()).await
    }
}

/// Wrap an async closure as a shareable [`MessageHandler`].
///
/// ```
/// use strand_types::handler_fn;
///
/// let handler = handler_fn(|_ctx, payload: Vec<u8>| async move {
///     println!("{} bytes", payload.len());
///     Ok(())
/// });
/// ```
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn MessageHandler>
where
    F: Fn(HandlerContext, Vec<u8>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BusError>> + Send + 'static,
{
    Arc::new(FnHandler { f })
}
