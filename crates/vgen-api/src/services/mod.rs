//! Background and shared services.

pub mod reconciler;

pub use reconciler::{CompletionOutcome, Reconciler};
