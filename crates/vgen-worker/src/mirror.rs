//! Scene-video mirroring into the artifact bucket.
//!
//! Third-party stock hosts expire their URLs; clips from those hosts get
//! copied under the job's storage prefix before submission, and the request
//! is rewritten to point at the stable copies. The staged keys are tracked
//! on the slot record so the completion sweep removes them.

use std::time::Duration;

use reqwest::Client;
use tracing::{debug, info};

use vgen_models::RenderRequest;
use vgen_storage::{job_prefix, ArtifactStore};

use crate::error::{WorkerError, WorkerResult};

pub struct ArtifactMirror {
    http: Client,
    store: ArtifactStore,
    hosts: Vec<String>,
}

impl ArtifactMirror {
    pub fn new(store: ArtifactStore, hosts: Vec<String>) -> WorkerResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(120))
            .connect_timeout(Duration::from_secs(5))
            .user_agent(concat!("vgen-worker/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| WorkerError::mirror(e.to_string()))?;

        Ok(Self { http, store, hosts })
    }

    fn should_mirror(&self, video_url: &str) -> bool {
        self.hosts.iter().any(|host| video_url.contains(host.as_str()))
    }

    /// Mirror matching scene videos and rewrite `request` in place.
    /// Returns the storage keys staged for this job.
    pub async fn stage(&self, request: &mut RenderRequest) -> WorkerResult<Vec<String>> {
        let prefix = job_prefix(&request.video_id);
        let mut staged = Vec::new();

        for (index, scene) in request.scenes.iter_mut().enumerate() {
            if !self.should_mirror(&scene.video_url) {
                continue;
            }

            debug!(
                job_id = %request.video_id,
                scene = index,
                url = %scene.video_url,
                "Mirroring scene video"
            );

            let response = self
                .http
                .get(&scene.video_url)
                .send()
                .await
                .map_err(|e| WorkerError::mirror(e.to_string()))?
                .error_for_status()
                .map_err(|e| WorkerError::mirror(e.to_string()))?;
            let bytes = response
                .bytes()
                .await
                .map_err(|e| WorkerError::mirror(e.to_string()))?;

            let key = format!("{}scene-{}.mp4", prefix, index);
            self.store.put_bytes(bytes.to_vec(), &key, "video/mp4").await?;

            scene.video_url = self.store.object_url(&key);
            staged.push(key);
        }

        if !staged.is_empty() {
            info!(
                job_id = %request.video_id,
                mirrored = staged.len(),
                "Scene videos mirrored into the artifact bucket"
            );
        }
        Ok(staged)
    }
}
