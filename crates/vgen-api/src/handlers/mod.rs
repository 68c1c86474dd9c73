//! Request handlers.

pub mod generate;
pub mod health;
pub mod webhook;

pub use generate::generate_video;
pub use health::{health, ready};
pub use webhook::render_webhook;
