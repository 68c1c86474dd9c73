//! Shared test doubles.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use vgen_models::RenderRequest;
use vgen_queue::{QueueDepth, QueueMessage, QueueResult, QueueSource};

/// Queue double that records every interaction.
#[derive(Default)]
pub struct RecordingQueue {
    pub inbox: Mutex<VecDeque<QueueMessage>>,
    pub stale: Mutex<VecDeque<QueueMessage>>,
    pub sent: Mutex<Vec<RenderRequest>>,
    pub acked: Mutex<Vec<String>>,
    pub dead: Mutex<Vec<(RenderRequest, String)>>,
}

impl RecordingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, message_id: &str, request: RenderRequest) {
        self.inbox.lock().unwrap().push_back(QueueMessage {
            message_id: message_id.to_string(),
            request,
        });
    }

    /// Stage a delivery that was received but never acked, as left behind
    /// by a crashed consumer. Returned by `claim_pending`, not `receive`.
    pub fn push_stale(&self, message_id: &str, request: RenderRequest) {
        self.stale.lock().unwrap().push_back(QueueMessage {
            message_id: message_id.to_string(),
            request,
        });
    }
}

#[async_trait]
impl QueueSource for RecordingQueue {
    async fn send(&self, request: &RenderRequest) -> QueueResult<String> {
        let mut sent = self.sent.lock().unwrap();
        sent.push(request.clone());
        Ok(format!("sent-{}", sent.len()))
    }

    async fn receive(&self, _wait: Duration) -> QueueResult<Option<QueueMessage>> {
        Ok(self.inbox.lock().unwrap().pop_front())
    }

    async fn ack(&self, message_id: &str) -> QueueResult<()> {
        self.acked.lock().unwrap().push(message_id.to_string());
        Ok(())
    }

    async fn dead_letter(&self, request: &RenderRequest, error: &str) -> QueueResult<()> {
        self.dead
            .lock()
            .unwrap()
            .push((request.clone(), error.to_string()));
        Ok(())
    }

    async fn claim_pending(
        &self,
        _min_idle: Duration,
        count: usize,
    ) -> QueueResult<Vec<QueueMessage>> {
        let mut stale = self.stale.lock().unwrap();
        let take = count.min(stale.len());
        Ok(stale.drain(..take).collect())
    }

    async fn depth(&self) -> QueueResult<QueueDepth> {
        Ok(QueueDepth {
            ready: self.inbox.lock().unwrap().len() as u64,
            dead: self.dead.lock().unwrap().len() as u64,
        })
    }
}
