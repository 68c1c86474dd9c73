//! Shared data models for the VidGen backend.
//!
//! This crate provides Serde-serializable types for:
//! - Render requests and scenes (the inbound wire format)
//! - Timed captions produced by transcription
//! - Slot-ledger job records

pub mod caption;
pub mod record;
pub mod request;
pub mod scene;

// Re-export common types
pub use caption::TimedCaption;
pub use record::{JobRecord, JobStatus};
pub use request::{JobId, RenderRequest};
pub use scene::Scene;
