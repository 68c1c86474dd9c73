//! Queue poller: drives deferred requests through the pipeline.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use vgen_queue::{QueueKind, QueueMessage, QueueSource, WakeStream};
use vgen_store::SlotStore;

use crate::backoff::{BackoffPolicy, IdleBackoff};
use crate::config::WorkerConfig;
use crate::error::WorkerResult;
use crate::metric;
use crate::pipeline::{PipelineOutcome, SubmissionPipeline};

/// Deliveries reclaimed from dead consumers per idle pass.
const PENDING_CLAIM_BATCH: usize = 5;

/// Poller states. `Draining` pulls and processes messages back to back;
/// `Idle` sleeps with growing backoff until a timer or wake event fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PollerState {
    Draining,
    Idle,
}

/// Consumes one deferred queue, one message at a time.
///
/// The poller drains as long as messages keep arriving and slots keep
/// opening. An empty poll or a deferral drops it to idle; a completion
/// wake or the idle timer brings it back.
pub struct QueuePoller {
    queue: Arc<dyn QueueSource>,
    pipeline: Arc<SubmissionPipeline>,
    store: Arc<dyn SlotStore>,
    kind: QueueKind,
    receive_wait: Duration,
    idle_policy: BackoffPolicy,
    stuck_slot_age: Duration,
    pending_claim_age: Duration,
}

impl QueuePoller {
    pub fn new(
        queue: Arc<dyn QueueSource>,
        pipeline: Arc<SubmissionPipeline>,
        store: Arc<dyn SlotStore>,
        kind: QueueKind,
        config: &WorkerConfig,
    ) -> Self {
        Self {
            queue,
            pipeline,
            store,
            kind,
            receive_wait: config.receive_wait,
            idle_policy: config.idle_backoff,
            stuck_slot_age: config.stuck_slot_age,
            pending_claim_age: config.pending_claim_age,
        }
    }

    /// Run until `shutdown` flips to true.
    pub async fn run(&self, mut wake: WakeStream, mut shutdown: watch::Receiver<bool>) {
        let mut idle = IdleBackoff::new(self.idle_policy);
        let mut state = PollerState::Draining;

        info!(queue = self.kind.as_str(), "Queue poller started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            match state {
                PollerState::Draining => match self.drain_once().await {
                    Ok(true) => {
                        idle.reset();
                    }
                    Ok(false) => {
                        state = PollerState::Idle;
                    }
                    Err(e) => {
                        warn!(queue = self.kind.as_str(), error = %e, "Drain failed");
                        state = PollerState::Idle;
                    }
                },
                PollerState::Idle => {
                    self.report_stuck_slots().await;

                    if self.claim_stale_deliveries().await {
                        idle.reset();
                        state = PollerState::Draining;
                        continue;
                    }

                    let delay = idle.next_delay();
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {
                            debug!(queue = self.kind.as_str(), "Idle timer expired");
                        }
                        event = wake.next() => {
                            if let Some(event) = event {
                                debug!(
                                    queue = self.kind.as_str(),
                                    job_id = %event.job_id,
                                    "Woken by completion"
                                );
                                idle.reset();
                            }
                        }
                        _ = shutdown.changed() => {}
                    }
                    state = PollerState::Draining;
                }
            }
        }

        info!(queue = self.kind.as_str(), "Queue poller stopped");
    }

    /// Pull and process one message. Returns `true` when the poller should
    /// keep draining, `false` when it should go idle.
    async fn drain_once(&self) -> WorkerResult<bool> {
        let Some(message) = self.queue.receive(self.receive_wait).await? else {
            return Ok(false);
        };

        self.handle(message).await
    }

    /// Reclaim deliveries another consumer received but never acked (a
    /// crashed worker, or a drain error that left the message pending)
    /// and run them through the pipeline. Returns `true` when any
    /// delivery made progress.
    async fn claim_stale_deliveries(&self) -> bool {
        let claimed = match self
            .queue
            .claim_pending(self.pending_claim_age, PENDING_CLAIM_BATCH)
            .await
        {
            Ok(claimed) => claimed,
            Err(e) => {
                warn!(queue = self.kind.as_str(), error = %e, "Pending claim failed");
                return false;
            }
        };

        let mut progressed = false;
        for message in claimed {
            info!(
                queue = self.kind.as_str(),
                job_id = %message.request.video_id,
                message_id = %message.message_id,
                "Reprocessing reclaimed delivery"
            );
            match self.handle(message).await {
                Ok(kept_draining) => progressed |= kept_draining,
                Err(e) => {
                    warn!(queue = self.kind.as_str(), error = %e, "Reclaimed delivery failed");
                }
            }
        }
        progressed
    }

    async fn handle(&self, message: QueueMessage) -> WorkerResult<bool> {
        match self.pipeline.process(&message.request).await? {
            PipelineOutcome::Submitted(_) => {
                self.queue.ack(&message.message_id).await?;
                Ok(true)
            }
            PipelineOutcome::Duplicate => {
                info!(
                    job_id = %message.request.video_id,
                    "Dropping duplicate delivery"
                );
                self.queue.ack(&message.message_id).await?;
                Ok(true)
            }
            PipelineOutcome::Deferred => {
                // The request is already back on the queue under a new
                // message id; ack this delivery and wait for a slot.
                self.queue.ack(&message.message_id).await?;
                Ok(false)
            }
            PipelineOutcome::Failed(err) => {
                warn!(
                    job_id = %message.request.video_id,
                    error = %err,
                    "Delivery failed terminally; acking after dead-letter"
                );
                self.queue.ack(&message.message_id).await?;
                Ok(true)
            }
        }
    }

    /// Flag slots held past the stuck threshold. A lost completion webhook
    /// leaves the ledger permanently occupied; this is the signal an
    /// operator acts on.
    async fn report_stuck_slots(&self) {
        let records = match self.store.list().await {
            Ok(records) => records,
            Err(e) => {
                debug!(error = %e, "Stuck-slot scan skipped");
                return;
            }
        };

        let threshold = self.stuck_slot_age.as_secs() as i64;
        let stuck: Vec<_> = records
            .iter()
            .filter(|r| r.age().num_seconds() >= threshold)
            .collect();

        metrics::gauge!(metric::SLOTS_STUCK).set(stuck.len() as f64);
        for record in stuck {
            warn!(
                job_id = %record.job_id,
                age_seconds = record.age().num_seconds(),
                "Slot held past stuck threshold; completion may have been lost"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backoff::BackoffPolicy;
    use crate::pipeline::RetrySettings;
    use crate::testutil::RecordingQueue;
    use futures_util::stream;
    use vgen_models::{JobRecord, RenderRequest, Scene};
    use vgen_render::{RenderClient, RenderConfig};
    use vgen_store::MemorySlotStore;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request(id: &str) -> RenderRequest {
        RenderRequest::new(
            id,
            vec![Scene::new("https://e.com/v.mp4", "https://e.com/a.mp3")],
        )
        .without_captions()
    }

    fn render_client(base_url: String) -> RenderClient {
        RenderClient::new(RenderConfig {
            base_url,
            composition: "vgen-video".to_string(),
            serve_url: "https://serve.example.com".to_string(),
            codec: "h264".to_string(),
            webhook_url: "https://api.example.com/webhook".to_string(),
            webhook_secret: None,
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    fn poller(
        store: Arc<MemorySlotStore>,
        queue: Arc<RecordingQueue>,
        render_url: String,
        limit: u64,
        idle_policy: BackoffPolicy,
    ) -> QueuePoller {
        let pipeline = Arc::new(SubmissionPipeline::new(
            store.clone(),
            queue.clone(),
            render_client(render_url),
            None,
            None,
            limit,
            RetrySettings {
                max_attempts: 2,
                backoff: BackoffPolicy::new(Duration::from_millis(1), Duration::from_millis(5)),
                rate_limit_floor: Duration::from_millis(1),
            },
        ));
        let config = WorkerConfig {
            receive_wait: Duration::from_millis(10),
            idle_backoff: idle_policy,
            ..WorkerConfig::default()
        };
        QueuePoller::new(queue, pipeline, store, QueueKind::Standard, &config)
    }

    async fn submitted_render_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/renders"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "renderId": "r-1",
                "bucketName": "out"
            })))
            .mount(&server)
            .await;
        server
    }

    fn fast_idle() -> BackoffPolicy {
        BackoffPolicy::new(Duration::from_millis(5), Duration::from_millis(10))
    }

    #[tokio::test]
    async fn drain_processes_and_acks_one_message() {
        let server = submitted_render_server().await;
        let store = Arc::new(MemorySlotStore::new());
        let queue = Arc::new(RecordingQueue::new());
        queue.push("m-1", request("j1"));

        let p = poller(store.clone(), queue.clone(), server.uri(), 1, fast_idle());

        assert!(p.drain_once().await.unwrap());
        assert_eq!(queue.acked.lock().unwrap().as_slice(), ["m-1"]);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn drain_goes_idle_on_empty_queue() {
        let server = submitted_render_server().await;
        let store = Arc::new(MemorySlotStore::new());
        let queue = Arc::new(RecordingQueue::new());

        let p = poller(store, queue, server.uri(), 1, fast_idle());
        assert!(!p.drain_once().await.unwrap());
    }

    #[tokio::test]
    async fn drain_requeues_and_goes_idle_when_slots_are_full() {
        let server = submitted_render_server().await;
        let store = Arc::new(MemorySlotStore::new());
        store
            .try_admit(JobRecord::new("busy".into()), 1)
            .await
            .unwrap();

        let queue = Arc::new(RecordingQueue::new());
        queue.push("m-1", request("j2"));

        let p = poller(store.clone(), queue.clone(), server.uri(), 1, fast_idle());

        assert!(!p.drain_once().await.unwrap());
        // Original delivery acked, request re-enqueued for later.
        assert_eq!(queue.acked.lock().unwrap().as_slice(), ["m-1"]);
        assert_eq!(queue.sent.lock().unwrap().len(), 1);
        assert_eq!(queue.sent.lock().unwrap()[0].video_id, "j2");
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn stale_unacked_delivery_is_reclaimed_and_processed() {
        let server = submitted_render_server().await;
        let store = Arc::new(MemorySlotStore::new());
        let queue = Arc::new(RecordingQueue::new());
        // A delivery a dead consumer received but never acked: invisible
        // to receive(), only claiming surfaces it.
        queue.push_stale("m-ghost", request("j9"));

        let p = poller(store.clone(), queue.clone(), server.uri(), 1, fast_idle());

        assert!(!p.drain_once().await.unwrap());
        assert!(queue.acked.lock().unwrap().is_empty());

        assert!(p.claim_stale_deliveries().await);
        assert_eq!(queue.acked.lock().unwrap().as_slice(), ["m-ghost"]);
        assert_eq!(store.count().await.unwrap(), 1);

        // Nothing left pending: the next pass is a no-op.
        assert!(!p.claim_stale_deliveries().await);
    }

    #[tokio::test]
    async fn reclaimed_duplicate_is_acked_without_resubmitting() {
        let server = submitted_render_server().await;
        let store = Arc::new(MemorySlotStore::new());
        // The job already holds its slot: the original consumer crashed
        // after admission. Reprocessing must ack without double-admitting.
        store
            .try_admit(JobRecord::new("j9".into()), 1)
            .await
            .unwrap();

        let queue = Arc::new(RecordingQueue::new());
        queue.push_stale("m-ghost", request("j9"));

        let p = poller(store.clone(), queue.clone(), server.uri(), 1, fast_idle());

        assert!(p.claim_stale_deliveries().await);
        assert_eq!(queue.acked.lock().unwrap().as_slice(), ["m-ghost"]);
        assert_eq!(store.count().await.unwrap(), 1);
        assert!(queue.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn wake_event_pulls_the_poller_out_of_idle() {
        let server = submitted_render_server().await;
        let store = Arc::new(MemorySlotStore::new());
        let queue = Arc::new(RecordingQueue::new());
        queue.push("m-1", request("j1"));

        // Idle delays far longer than the test: only a wake can trigger
        // the second drain.
        let idle_policy = BackoffPolicy::new(Duration::from_secs(30), Duration::from_secs(30));
        let p = Arc::new(poller(
            store.clone(),
            queue.clone(),
            server.uri(),
            1,
            idle_policy,
        ));

        let (wake_tx, wake_rx) = futures::channel::mpsc::unbounded();
        let wake: WakeStream = Box::pin(wake_rx);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let runner = {
            let p = p.clone();
            tokio::spawn(async move { p.run(wake, shutdown_rx).await })
        };

        // First drain consumes m-1 and goes idle on the empty queue.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(queue.acked.lock().unwrap().as_slice(), ["m-1"]);

        // Completion: slot freed, new message queued, wake published.
        store
            .find_and_remove(&"j1".into())
            .await
            .unwrap()
            .expect("record present");
        queue.push("m-2", request("j2"));
        wake_tx
            .unbounded_send(vgen_queue::WakeEvent {
                job_id: "j1".into(),
            })
            .unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(queue.acked.lock().unwrap().as_slice(), ["m-1", "m-2"]);
        assert_eq!(store.count().await.unwrap(), 1);

        shutdown_tx.send(true).unwrap();
        let _ = tokio::time::timeout(Duration::from_secs(1), runner).await;
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let server = submitted_render_server().await;
        let store = Arc::new(MemorySlotStore::new());
        let queue = Arc::new(RecordingQueue::new());

        let p = Arc::new(poller(store, queue, server.uri(), 1, fast_idle()));
        let wake: WakeStream = Box::pin(stream::pending());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let runner = tokio::spawn(async move { p.run(wake, shutdown_rx).await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown_tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(1), runner)
            .await
            .expect("poller exits after shutdown")
            .unwrap();
    }
}
