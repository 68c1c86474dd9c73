//! Deferred queue using Redis Streams.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::{debug, info, warn};

use vgen_models::RenderRequest;

use crate::error::{QueueError, QueueResult};

/// Which deferred queue a request belongs to.
///
/// Captioned jobs run through the transcription fan-out and historically
/// lived on their own queue; both kinds share one implementation and one
/// poller abstraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueKind {
    Standard,
    Captioned,
}

impl QueueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueKind::Standard => "standard",
            QueueKind::Captioned => "captioned",
        }
    }

    /// Queue kind for a request.
    pub fn for_request(request: &RenderRequest) -> Self {
        if request.caption {
            QueueKind::Captioned
        } else {
            QueueKind::Standard
        }
    }
}

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Redis URL
    pub redis_url: String,
    /// Stream name for deferred jobs
    pub stream_name: String,
    /// Consumer group name
    pub consumer_group: String,
    /// Dead letter stream name
    pub dlq_stream_name: String,
}

impl QueueConfig {
    /// Create config for a queue kind from environment variables.
    pub fn from_env(kind: QueueKind) -> Self {
        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
        let stream_name = match kind {
            QueueKind::Standard => std::env::var("QUEUE_STREAM")
                .unwrap_or_else(|_| "vgen:jobs".to_string()),
            QueueKind::Captioned => std::env::var("QUEUE_CAPTION_STREAM")
                .unwrap_or_else(|_| "vgen:jobs:captions".to_string()),
        };

        Self {
            redis_url,
            stream_name,
            consumer_group: std::env::var("QUEUE_CONSUMER_GROUP")
                .unwrap_or_else(|_| "vgen:workers".to_string()),
            dlq_stream_name: std::env::var("QUEUE_DLQ_STREAM")
                .unwrap_or_else(|_| "vgen:dlq".to_string()),
        }
    }
}

/// One received message: a render request plus the receipt handle needed to
/// acknowledge it.
#[derive(Debug, Clone)]
pub struct QueueMessage {
    /// Stream entry id (receipt handle)
    pub message_id: String,
    /// The deferred request
    pub request: RenderRequest,
}

/// Backlog sizes for the queue and its dead-letter stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueDepth {
    /// Entries on the main stream
    pub ready: u64,
    /// Entries on the dead-letter stream
    pub dead: u64,
}

/// Transport seam for the queue poller.
///
/// At-least-once delivery: a message that is received but never acked stays
/// pending until `claim_pending` hands it to a live consumer, so consumers
/// must be idempotent per job id.
#[async_trait]
pub trait QueueSource: Send + Sync {
    /// Append a request to the queue.
    async fn send(&self, request: &RenderRequest) -> QueueResult<String>;

    /// Long-poll for the next message, blocking up to `wait`.
    async fn receive(&self, wait: Duration) -> QueueResult<Option<QueueMessage>>;

    /// Acknowledge (and drop) a delivered message.
    async fn ack(&self, message_id: &str) -> QueueResult<()>;

    /// Record a request that exhausted its retries, out-of-band.
    async fn dead_letter(&self, request: &RenderRequest, error: &str) -> QueueResult<()>;

    /// Take over deliveries another consumer received but never acked,
    /// once they have sat idle for at least `min_idle`.
    async fn claim_pending(
        &self,
        min_idle: Duration,
        count: usize,
    ) -> QueueResult<Vec<QueueMessage>>;

    /// Current backlog sizes.
    async fn depth(&self) -> QueueResult<QueueDepth>;
}

/// Redis Streams deferred queue.
pub struct DeferredQueue {
    client: redis::Client,
    config: QueueConfig,
    consumer_name: String,
}

impl DeferredQueue {
    /// Create a new queue client.
    pub fn new(config: QueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        let consumer_name = format!("worker-{}", uuid::Uuid::new_v4());
        Ok(Self {
            client,
            config,
            consumer_name,
        })
    }

    /// Create from environment variables.
    pub fn from_env(kind: QueueKind) -> QueueResult<Self> {
        Self::new(QueueConfig::from_env(kind))
    }

    /// Initialize the queue (create consumer group if not exists).
    pub async fn init(&self) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let result: Result<(), redis::RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg("$")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(_) => info!("Created consumer group: {}", self.config.consumer_group),
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                debug!("Consumer group already exists: {}", self.config.consumer_group);
            }
            Err(e) => return Err(QueueError::Redis(e)),
        }

        Ok(())
    }

    /// Queue length.
    pub async fn len(&self) -> QueueResult<u64> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let len: u64 = conn.xlen(&self.config.stream_name).await?;
        Ok(len)
    }

    /// Dead-letter stream length.
    pub async fn dlq_len(&self) -> QueueResult<u64> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let len: u64 = conn.xlen(&self.config.dlq_stream_name).await?;
        Ok(len)
    }
}

#[async_trait]
impl QueueSource for DeferredQueue {
    async fn send(&self, request: &RenderRequest) -> QueueResult<String> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payload = serde_json::to_string(request)?;

        let message_id: String = redis::cmd("XADD")
            .arg(&self.config.stream_name)
            .arg("*")
            .arg("job")
            .arg(&payload)
            .query_async(&mut conn)
            .await?;

        info!(
            job_id = %request.video_id,
            message_id = %message_id,
            stream = %self.config.stream_name,
            "Enqueued render request"
        );
        Ok(message_id)
    }

    async fn receive(&self, wait: Duration) -> QueueResult<Option<QueueMessage>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let result: redis::streams::StreamReadReply = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&self.config.consumer_group)
            .arg(&self.consumer_name)
            .arg("COUNT")
            .arg(1)
            .arg("BLOCK")
            .arg(wait.as_millis() as u64)
            .arg("STREAMS")
            .arg(&self.config.stream_name)
            .arg(">")
            .query_async(&mut conn)
            .await?;

        for stream_key in result.keys {
            for entry in stream_key.ids {
                let message_id = entry.id.clone();

                if let Some(redis::Value::BulkString(payload)) = entry.map.get("job") {
                    let payload_str = String::from_utf8_lossy(payload);
                    match serde_json::from_str::<RenderRequest>(&payload_str) {
                        Ok(request) => {
                            debug!(job_id = %request.video_id, "Received deferred request");
                            return Ok(Some(QueueMessage {
                                message_id,
                                request,
                            }));
                        }
                        Err(e) => {
                            warn!("Failed to parse queued request: {}", e);
                            // Ack the malformed message to prevent reprocessing
                            self.ack(&message_id).await.ok();
                        }
                    }
                }
            }
        }

        Ok(None)
    }

    async fn ack(&self, message_id: &str) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        redis::cmd("XACK")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        redis::cmd("XDEL")
            .arg(&self.config.stream_name)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        debug!("Acknowledged message: {}", message_id);
        Ok(())
    }

    async fn dead_letter(&self, request: &RenderRequest, error: &str) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payload = serde_json::to_string(request)?;

        redis::cmd("XADD")
            .arg(&self.config.dlq_stream_name)
            .arg("*")
            .arg("job")
            .arg(&payload)
            .arg("error")
            .arg(error)
            .query_async::<()>(&mut conn)
            .await?;

        warn!(job_id = %request.video_id, "Moved request to DLQ: {}", error);
        Ok(())
    }

    async fn claim_pending(
        &self,
        min_idle: Duration,
        count: usize,
    ) -> QueueResult<Vec<QueueMessage>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let pending: redis::streams::StreamPendingReply = redis::cmd("XPENDING")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .query_async(&mut conn)
            .await?;

        if pending.count() == 0 {
            return Ok(Vec::new());
        }

        // XCLAIM from 0-0 claims any entry at or above the idle cutoff and
        // reassigns it to this consumer.
        let result: redis::streams::StreamClaimReply = redis::cmd("XCLAIM")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(&self.consumer_name)
            .arg(min_idle.as_millis() as u64)
            .arg("0-0")
            .arg("COUNT")
            .arg(count)
            .query_async(&mut conn)
            .await?;

        let mut messages = Vec::new();

        for entry in result.ids {
            let message_id = entry.id.clone();

            if let Some(redis::Value::BulkString(payload)) = entry.map.get("job") {
                let payload_str = String::from_utf8_lossy(payload);
                match serde_json::from_str::<RenderRequest>(&payload_str) {
                    Ok(request) => {
                        info!(
                            job_id = %request.video_id,
                            message_id = %message_id,
                            "Claimed stale pending delivery"
                        );
                        messages.push(QueueMessage {
                            message_id,
                            request,
                        });
                    }
                    Err(e) => {
                        warn!("Failed to parse claimed request: {}", e);
                        self.ack(&message_id).await.ok();
                    }
                }
            }
        }

        Ok(messages)
    }

    async fn depth(&self) -> QueueResult<QueueDepth> {
        Ok(QueueDepth {
            ready: self.len().await?,
            dead: self.dlq_len().await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vgen_models::Scene;

    #[test]
    fn queue_kind_follows_caption_flag() {
        let captioned = RenderRequest::new(
            "vid-1",
            vec![Scene::new("https://e.com/v.mp4", "https://e.com/a.mp3")],
        );
        assert_eq!(QueueKind::for_request(&captioned), QueueKind::Captioned);

        let plain = captioned.clone().without_captions();
        assert_eq!(QueueKind::for_request(&plain), QueueKind::Standard);
    }
}
