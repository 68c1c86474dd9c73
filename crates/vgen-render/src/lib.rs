//! Client for the managed rendering backend.
//!
//! Submitting a job returns an opaque render id; completion is reported
//! later through the webhook the submission carries. The backend exposes a
//! distinguished rate-limit rejection that the submission pipeline must
//! retry with a minimum delay floor.

pub mod client;
pub mod error;

pub use client::{RenderClient, RenderConfig, RenderHandle, RenderSubmission, WebhookRef};
pub use error::{RenderError, RenderResult};
