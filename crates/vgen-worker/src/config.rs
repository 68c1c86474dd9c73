//! Worker configuration.

use std::str::FromStr;
use std::time::Duration;

use crate::backoff::BackoffPolicy;

const DEFAULT_CONCURRENCY_LIMIT: u64 = 1;
const DEFAULT_SUBMIT_MAX_ATTEMPTS: u32 = 5;
const DEFAULT_SUBMIT_BACKOFF_BASE_MS: u64 = 1_000;
const DEFAULT_SUBMIT_BACKOFF_CAP_MS: u64 = 150_000;
const DEFAULT_RATE_LIMIT_FLOOR_MS: u64 = 10_000;
const DEFAULT_IDLE_BACKOFF_BASE_MS: u64 = 2_000;
const DEFAULT_IDLE_BACKOFF_CAP_MS: u64 = 30_000;
const DEFAULT_RECEIVE_WAIT_SECS: u64 = 10;
const DEFAULT_TRANSCRIBE_PARALLEL: usize = 4;
const DEFAULT_STUCK_SLOT_AGE_SECS: u64 = 1_800;
const DEFAULT_PENDING_CLAIM_AGE_SECS: u64 = 300;
const DEFAULT_MIRROR_HOSTS: &str = "pexels.com";

fn env_parse<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum jobs holding a slot at once, across all workers
    pub concurrency_limit: u64,
    /// Submission attempts per delivery before dead-lettering
    pub submit_max_attempts: u32,
    /// Backoff between failed submission attempts
    pub submit_backoff: BackoffPolicy,
    /// Minimum wait after the rendering backend throttles an attempt
    pub rate_limit_floor: Duration,
    /// Backoff between polls of an empty queue
    pub idle_backoff: BackoffPolicy,
    /// How long one queue receive blocks waiting for a message
    pub receive_wait: Duration,
    /// Scenes transcribed concurrently per job
    pub transcribe_parallel: usize,
    /// Age past which a held slot is reported as stuck
    pub stuck_slot_age: Duration,
    /// Idle time after which an unacked delivery is reclaimed from its
    /// original consumer
    pub pending_claim_age: Duration,
    /// Hosts whose scene videos get mirrored into the artifact bucket
    pub mirror_hosts: Vec<String>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: DEFAULT_CONCURRENCY_LIMIT,
            submit_max_attempts: DEFAULT_SUBMIT_MAX_ATTEMPTS,
            submit_backoff: BackoffPolicy::new(
                Duration::from_millis(DEFAULT_SUBMIT_BACKOFF_BASE_MS),
                Duration::from_millis(DEFAULT_SUBMIT_BACKOFF_CAP_MS),
            ),
            rate_limit_floor: Duration::from_millis(DEFAULT_RATE_LIMIT_FLOOR_MS),
            idle_backoff: BackoffPolicy::new(
                Duration::from_millis(DEFAULT_IDLE_BACKOFF_BASE_MS),
                Duration::from_millis(DEFAULT_IDLE_BACKOFF_CAP_MS),
            ),
            receive_wait: Duration::from_secs(DEFAULT_RECEIVE_WAIT_SECS),
            transcribe_parallel: DEFAULT_TRANSCRIBE_PARALLEL,
            stuck_slot_age: Duration::from_secs(DEFAULT_STUCK_SLOT_AGE_SECS),
            pending_claim_age: Duration::from_secs(DEFAULT_PENDING_CLAIM_AGE_SECS),
            mirror_hosts: vec![DEFAULT_MIRROR_HOSTS.to_string()],
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mirror_hosts = std::env::var("MIRROR_HOSTS")
            .unwrap_or_else(|_| DEFAULT_MIRROR_HOSTS.to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Self {
            concurrency_limit: env_parse("CONCURRENCY_LIMIT", DEFAULT_CONCURRENCY_LIMIT).max(1),
            submit_max_attempts: env_parse("SUBMIT_MAX_ATTEMPTS", DEFAULT_SUBMIT_MAX_ATTEMPTS)
                .max(1),
            submit_backoff: BackoffPolicy::new(
                Duration::from_millis(env_parse(
                    "SUBMIT_BACKOFF_BASE_MS",
                    DEFAULT_SUBMIT_BACKOFF_BASE_MS,
                )),
                Duration::from_millis(env_parse(
                    "SUBMIT_BACKOFF_CAP_MS",
                    DEFAULT_SUBMIT_BACKOFF_CAP_MS,
                )),
            ),
            rate_limit_floor: Duration::from_millis(env_parse(
                "RATE_LIMIT_FLOOR_MS",
                DEFAULT_RATE_LIMIT_FLOOR_MS,
            )),
            idle_backoff: BackoffPolicy::new(
                Duration::from_millis(env_parse(
                    "IDLE_BACKOFF_BASE_MS",
                    DEFAULT_IDLE_BACKOFF_BASE_MS,
                )),
                Duration::from_millis(env_parse(
                    "IDLE_BACKOFF_CAP_MS",
                    DEFAULT_IDLE_BACKOFF_CAP_MS,
                )),
            ),
            receive_wait: Duration::from_secs(env_parse(
                "QUEUE_RECEIVE_WAIT_SECS",
                DEFAULT_RECEIVE_WAIT_SECS,
            )),
            transcribe_parallel: env_parse("TRANSCRIBE_PARALLEL", DEFAULT_TRANSCRIBE_PARALLEL)
                .max(1),
            stuck_slot_age: Duration::from_secs(env_parse(
                "STUCK_SLOT_AGE_SECS",
                DEFAULT_STUCK_SLOT_AGE_SECS,
            )),
            pending_claim_age: Duration::from_secs(env_parse(
                "PENDING_CLAIM_AGE_SECS",
                DEFAULT_PENDING_CLAIM_AGE_SECS,
            )),
            mirror_hosts,
        }
    }
}
