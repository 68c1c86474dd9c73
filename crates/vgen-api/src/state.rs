//! Application state.

use std::sync::Arc;

use tracing::info;

use vgen_models::RenderRequest;
use vgen_queue::{DeferredQueue, QueueKind, QueueSource, WakeChannel, WakeSignal};
use vgen_storage::{ArtifactCleaner, ArtifactStore, StorageCleaner};
use vgen_store::{RedisSlotStore, SlotStore};

use crate::config::ApiConfig;
use crate::error::ApiResult;
use crate::services::Reconciler;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub store: Arc<dyn SlotStore>,
    pub standard_queue: Arc<dyn QueueSource>,
    pub captioned_queue: Arc<dyn QueueSource>,
    pub wake: Arc<dyn WakeSignal>,
    pub reconciler: Arc<Reconciler>,
    /// Present when an artifact bucket is configured; used for readiness.
    pub storage: Option<ArtifactStore>,
}

impl AppState {
    /// Create application state from the environment.
    pub async fn new(config: ApiConfig) -> ApiResult<Self> {
        let store: Arc<dyn SlotStore> = Arc::new(RedisSlotStore::from_env()?);

        let standard = DeferredQueue::from_env(QueueKind::Standard)?;
        standard.init().await?;
        let captioned = DeferredQueue::from_env(QueueKind::Captioned)?;
        captioned.init().await?;

        let wake: Arc<dyn WakeSignal> = Arc::new(WakeChannel::from_env()?);

        let storage = match ArtifactStore::from_env().await {
            Ok(s) => Some(s),
            Err(e) => {
                info!("Artifact storage not configured, cleanup disabled: {}", e);
                None
            }
        };
        let cleaner = storage
            .clone()
            .map(|s| Arc::new(StorageCleaner::new(s)) as Arc<dyn ArtifactCleaner>);

        Ok(Self::with_parts(
            config,
            store,
            Arc::new(standard),
            Arc::new(captioned),
            wake,
            cleaner,
            storage,
        ))
    }

    /// Assemble state from pre-built parts.
    pub fn with_parts(
        config: ApiConfig,
        store: Arc<dyn SlotStore>,
        standard_queue: Arc<dyn QueueSource>,
        captioned_queue: Arc<dyn QueueSource>,
        wake: Arc<dyn WakeSignal>,
        cleaner: Option<Arc<dyn ArtifactCleaner>>,
        storage: Option<ArtifactStore>,
    ) -> Self {
        let reconciler = Arc::new(Reconciler::new(store.clone(), cleaner, wake.clone()));
        Self {
            config,
            store,
            standard_queue,
            captioned_queue,
            wake,
            reconciler,
            storage,
        }
    }

    /// Queue a request belongs to.
    pub fn queue_for(&self, request: &RenderRequest) -> &Arc<dyn QueueSource> {
        match QueueKind::for_request(request) {
            QueueKind::Captioned => &self.captioned_queue,
            QueueKind::Standard => &self.standard_queue,
        }
    }
}
