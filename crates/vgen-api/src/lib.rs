//! HTTP API: job intake and render completion webhook.
//!
//! Intake validates and enqueues; it never admits. The webhook is the
//! counterpart of the worker's submission: it frees the slot a rendered
//! job held, sweeps the job's staged artifacts and wakes the pollers.

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use services::{CompletionOutcome, Reconciler};
pub use state::AppState;
