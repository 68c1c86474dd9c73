//! Wake events via Redis Pub/Sub.
//!
//! The completion reconciler publishes a wake after every webhook, whether
//! or not the job was known. Every queue poller holds a subscription and
//! uses the event to leave its idle state and pull the next deferred job.

use async_trait::async_trait;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use tracing::debug;

use vgen_models::JobId;

use crate::error::QueueResult;

const WAKE_CHANNEL: &str = "vgen:wake";

/// Wake event published to Redis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WakeEvent {
    /// Job whose completion (or arrival) triggered the wake
    pub job_id: JobId,
}

/// Stream of wake events.
pub type WakeStream = std::pin::Pin<Box<dyn futures_util::Stream<Item = WakeEvent> + Send>>;

/// Publisher seam for the reconciler and the API enqueue path.
#[async_trait]
pub trait WakeSignal: Send + Sync {
    /// Broadcast a wake to all pollers.
    async fn notify(&self, job_id: &JobId) -> QueueResult<()>;
}

/// Redis Pub/Sub wake channel.
pub struct WakeChannel {
    client: redis::Client,
}

impl WakeChannel {
    /// Create a new wake channel.
    pub fn new(redis_url: &str) -> QueueResult<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self { client })
    }

    /// Create from environment variables.
    pub fn from_env() -> QueueResult<Self> {
        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
        Self::new(&redis_url)
    }

    /// Subscribe to wake events.
    /// Returns a pinned stream that can be polled with `.next()`.
    pub async fn subscribe(&self) -> QueueResult<WakeStream> {
        use futures_util::StreamExt;

        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(WAKE_CHANNEL).await?;

        let stream = pubsub.into_on_message().filter_map(|msg| async move {
            let payload: String = msg.get_payload().ok()?;
            serde_json::from_str(&payload).ok()
        });

        Ok(Box::pin(stream))
    }
}

#[async_trait]
impl WakeSignal for WakeChannel {
    async fn notify(&self, job_id: &JobId) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payload = serde_json::to_string(&WakeEvent {
            job_id: job_id.clone(),
        })?;

        debug!(job_id = %job_id, "Publishing wake event");
        conn.publish::<_, _, ()>(WAKE_CHANNEL, payload).await?;
        Ok(())
    }
}
