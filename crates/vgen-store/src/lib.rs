//! Durable slot ledger for admitted render jobs.
//!
//! This crate provides:
//! - The [`SlotStore`] trait: atomic check-and-insert admission, release,
//!   and lookup of `processing` records
//! - [`RedisSlotStore`]: the production implementation (Redis hash + Lua)
//! - [`MemorySlotStore`]: in-process implementation for tests and local dev
//!
//! The slot count derived from this store is the single admission invariant
//! the pipeline enforces: `count() <= concurrency_limit` at all times.

pub mod error;
pub mod memory;
pub mod redis_store;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use memory::MemorySlotStore;
pub use redis_store::{RedisSlotStore, StoreConfig};
pub use store::{Admission, SlotStore};
