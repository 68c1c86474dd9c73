//! Render worker binary.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vgen_queue::{DeferredQueue, QueueKind, QueueSource, WakeChannel};
use vgen_render::RenderClient;
use vgen_storage::ArtifactStore;
use vgen_store::{RedisSlotStore, SlotStore};
use vgen_transcribe::TranscribeClient;
use vgen_worker::{
    ArtifactMirror, CaptionComposer, QueuePoller, RetrySettings, SubmissionPipeline, WorkerConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();
    info!("Starting vgen-worker");

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    let store: Arc<dyn SlotStore> = Arc::new(RedisSlotStore::from_env()?);

    let render = RenderClient::from_env()?;
    let transcribe = TranscribeClient::from_env()?;

    let artifacts = match ArtifactStore::from_env().await {
        Ok(store) => Some(store),
        Err(e) => {
            info!("Artifact storage not configured, mirroring disabled: {}", e);
            None
        }
    };

    let wake_channel = WakeChannel::from_env()?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut pollers = Vec::new();
    for kind in [QueueKind::Standard, QueueKind::Captioned] {
        let queue = DeferredQueue::from_env(kind)?;
        queue.init().await?;
        let queue: Arc<dyn QueueSource> = Arc::new(queue);

        let captions = match kind {
            QueueKind::Captioned => Some(CaptionComposer::new(
                transcribe.clone(),
                config.transcribe_parallel,
            )),
            QueueKind::Standard => None,
        };
        let mirror = match &artifacts {
            Some(store) => Some(ArtifactMirror::new(
                store.clone(),
                config.mirror_hosts.clone(),
            )?),
            None => None,
        };

        let pipeline = Arc::new(SubmissionPipeline::new(
            store.clone(),
            queue.clone(),
            render.clone(),
            captions,
            mirror,
            config.concurrency_limit,
            RetrySettings {
                max_attempts: config.submit_max_attempts,
                backoff: config.submit_backoff,
                rate_limit_floor: config.rate_limit_floor,
            },
        ));

        let poller = QueuePoller::new(queue, pipeline, store.clone(), kind, &config);
        let wake = wake_channel.subscribe().await?;
        let shutdown = shutdown_rx.clone();

        pollers.push(tokio::spawn(async move {
            poller.run(wake, shutdown).await;
        }));
    }

    tokio::signal::ctrl_c().await.ok();
    info!("Received shutdown signal");
    shutdown_tx.send(true).ok();

    for poller in pollers {
        if let Err(e) = poller.await {
            error!("Poller task panicked: {}", e);
        }
    }

    info!("Worker shutdown complete");
    Ok(())
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("vgen=info".parse().expect("valid directive"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}
