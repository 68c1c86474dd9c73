//! Client for the managed transcription backend.
//!
//! One call per scene: the scene's audio URL goes in, a list of timed
//! words comes back. Callers own ordering and parallelism.

pub mod client;
pub mod error;

pub use client::{TranscribeClient, TranscribeConfig};
pub use error::{TranscribeError, TranscribeResult};
