//! Deferred queue on Redis Streams.
//!
//! This crate provides:
//! - At-least-once job delivery via Redis Streams with a consumer group
//! - A dead-letter stream for jobs that exhausted their retries
//! - The wake channel (Redis Pub/Sub) that advances the queue after a
//!   completion webhook

pub mod error;
pub mod queue;
pub mod wake;

pub use error::{QueueError, QueueResult};
pub use queue::{DeferredQueue, QueueConfig, QueueDepth, QueueKind, QueueMessage, QueueSource};
pub use wake::{WakeChannel, WakeEvent, WakeSignal, WakeStream};
