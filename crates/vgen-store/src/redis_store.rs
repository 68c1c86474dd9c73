//! Redis-backed slot store.
//!
//! Records live in a single hash keyed by job id. Admission runs as a Lua
//! script so the count check and insert execute atomically inside Redis;
//! the read-then-write race of a client-side check cannot occur.

use redis::AsyncCommands;
use tracing::{debug, warn};

use vgen_models::{JobId, JobRecord};

use crate::error::{StoreError, StoreResult};
use crate::store::{Admission, SlotStore};

/// Atomic check-and-insert. KEYS[1] = ledger hash, ARGV[1] = job id,
/// ARGV[2] = limit, ARGV[3] = record payload.
const ADMIT_SCRIPT: &str = r#"
if redis.call('HEXISTS', KEYS[1], ARGV[1]) == 1 then
    return -1
end
if redis.call('HLEN', KEYS[1]) >= tonumber(ARGV[2]) then
    return 0
end
redis.call('HSET', KEYS[1], ARGV[1], ARGV[3])
return 1
"#;

/// Store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Redis URL
    pub redis_url: String,
    /// Hash key holding the slot ledger
    pub ledger_key: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            ledger_key: "vgen:slots".to_string(),
        }
    }
}

impl StoreConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            ledger_key: std::env::var("STORE_LEDGER_KEY")
                .unwrap_or_else(|_| "vgen:slots".to_string()),
        }
    }
}

/// Redis-backed slot store.
pub struct RedisSlotStore {
    client: redis::Client,
    config: StoreConfig,
    admit_script: redis::Script,
}

impl RedisSlotStore {
    /// Create a new store.
    pub fn new(config: StoreConfig) -> StoreResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self {
            client,
            config,
            admit_script: redis::Script::new(ADMIT_SCRIPT),
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> StoreResult<Self> {
        Self::new(StoreConfig::from_env())
    }

    async fn connection(&self) -> StoreResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| StoreError::unavailable(e.to_string()))
    }
}

#[async_trait::async_trait]
impl SlotStore for RedisSlotStore {
    async fn try_admit(&self, record: JobRecord, limit: u64) -> StoreResult<Admission> {
        let mut conn = self.connection().await?;
        let payload = serde_json::to_string(&record)?;

        let outcome: i64 = self
            .admit_script
            .key(&self.config.ledger_key)
            .arg(record.job_id.as_str())
            .arg(limit)
            .arg(&payload)
            .invoke_async(&mut conn)
            .await?;

        let admission = match outcome {
            1 => Admission::Admitted,
            0 => Admission::LimitReached,
            _ => Admission::AlreadyAdmitted,
        };

        debug!(job_id = %record.job_id, ?admission, "Admission attempt");
        Ok(admission)
    }

    async fn count(&self) -> StoreResult<u64> {
        let mut conn = self.connection().await?;
        let count: u64 = conn.hlen(&self.config.ledger_key).await?;
        Ok(count)
    }

    async fn remove(&self, job_id: &JobId) -> StoreResult<u64> {
        let mut conn = self.connection().await?;
        let removed: u64 = conn.hdel(&self.config.ledger_key, job_id.as_str()).await?;
        debug!(job_id = %job_id, removed, "Released slot");
        Ok(removed)
    }

    async fn find_and_remove(&self, job_id: &JobId) -> StoreResult<Option<JobRecord>> {
        let mut conn = self.connection().await?;

        // HGET + HDEL in one pipeline round trip. HDEL's reply tells us
        // whether this call actually removed the record, so a concurrent
        // duplicate observes `None`.
        let (payload, removed): (Option<String>, u64) = redis::pipe()
            .hget(&self.config.ledger_key, job_id.as_str())
            .hdel(&self.config.ledger_key, job_id.as_str())
            .query_async(&mut conn)
            .await?;

        if removed == 0 {
            return Ok(None);
        }

        match payload {
            Some(json) => {
                let record: JobRecord = serde_json::from_str(&json)
                    .map_err(|_| StoreError::CorruptRecord(job_id.to_string()))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    async fn add_artifacts(&self, job_id: &JobId, keys: &[String]) -> StoreResult<()> {
        if keys.is_empty() {
            return Ok(());
        }

        let mut conn = self.connection().await?;
        let payload: Option<String> = conn.hget(&self.config.ledger_key, job_id.as_str()).await?;

        let Some(json) = payload else {
            warn!(job_id = %job_id, "Artifact keys for a job no longer in the ledger");
            return Ok(());
        };

        let mut record: JobRecord = serde_json::from_str(&json)
            .map_err(|_| StoreError::CorruptRecord(job_id.to_string()))?;
        record.artifact_keys.extend(keys.iter().cloned());

        let updated = serde_json::to_string(&record)?;
        conn.hset::<_, _, _, ()>(&self.config.ledger_key, job_id.as_str(), updated)
            .await?;
        Ok(())
    }

    async fn list(&self) -> StoreResult<Vec<JobRecord>> {
        let mut conn = self.connection().await?;
        let entries: Vec<(String, String)> = conn.hgetall(&self.config.ledger_key).await?;

        let mut records = Vec::with_capacity(entries.len());
        for (job_id, json) in entries {
            match serde_json::from_str::<JobRecord>(&json) {
                Ok(record) => records.push(record),
                Err(e) => warn!(job_id = %job_id, "Skipping corrupt ledger record: {}", e),
            }
        }
        Ok(records)
    }
}
