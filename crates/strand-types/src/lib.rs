//! # Strand Types - Shared Types and Ports
//!
//! Single source of truth for the types that cross crate boundaries in the
//! Strand event bus: the message envelope, the handler contract, the
//! `EventBus` trait every transport implements, and the plug-in policy
//! ports (rate limiting, backlog detection).
//!
//! ## Design Principles
//!
//! - **One envelope**: every transport publishes and consumes [`Message`];
//!   transport-native records are translated at the adapter boundary.
//! - **Ports as small traits**: policies the bus consumes but does not own
//!   ([`RateLimit`], [`BacklogDetector`]) are `Send + Sync` traits so
//!   deployments can swap implementations without touching the bus.
//! - **Keys are optional**: a message with a key is processed in arrival
//!   order relative to other messages with the same key; a message without
//!   one is processed with maximum parallelism.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod backlog;
pub mod bus;
pub mod errors;
pub mod handler;
pub mod message;
pub mod rate_limiter;
pub mod topic;

// Re-export main types
pub use backlog::{BacklogDetector, LagThresholdDetector};
pub use bus::{EventBus, SubscribeOptions, SubscriptionHandle};
pub use errors::BusError;
pub use handler::{handler_fn, HandlerContext, MessageHandler};
pub use message::Message;
pub use rate_limiter::{RateLimit, TokenBucket};
pub use topic::TopicConfig;
