use async_trait::async_trait;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::job::ProcessingJob;

const KEY_PREFIX: &str = "image_compressor:job";

/// Default retention for job records in the durable backend.
pub const DEFAULT_JOB_TTL: Duration = Duration::from_secs(24 * 60 * 60);

pub fn job_key(id: Uuid) -> String {
    format!("{KEY_PREFIX}:{id}")
}

/// Keyed storage for job records.
#[async_trait]
pub trait KvBackend: Send + Sync {
    /// Short backend name for logs and health output.
    fn name(&self) -> &'static str;

    async fn get(&self, id: Uuid) -> Result<Option<ProcessingJob>, StoreError>;

    /// Store `job` under its id. Backends that support expiry apply `ttl`.
    async fn put(&self, job: &ProcessingJob, ttl: Duration) -> Result<(), StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
}

/// Redis-backed job records, one JSON value per key with a TTL.
pub struct RedisStore {
    client: redis::Client,
}

impl RedisStore {
    pub fn new(redis_url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url).map_err(StoreError::Redis)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl KvBackend for RedisStore {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, id: Uuid) -> Result<Option<ProcessingJob>, StoreError> {
        let mut conn = self.client.get_multiplexed_async_connection().await.map_err(StoreError::Redis)?;
        let payload: Option<String> = conn.get(job_key(id)).await.map_err(StoreError::Redis)?;

        match payload {
            Some(payload) => {
                let job = serde_json::from_str(&payload).map_err(StoreError::Serialize)?;
                Ok(Some(job))
            }
            None => Ok(None),
        }
    }

    async fn put(&self, job: &ProcessingJob, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.client.get_multiplexed_async_connection().await.map_err(StoreError::Redis)?;
        let payload = serde_json::to_string(job).map_err(StoreError::Serialize)?;
        conn.set_ex::<_, _, ()>(job_key(job.id), payload, ttl.as_secs().max(1))
            .await
            .map_err(StoreError::Redis)?;
        Ok(())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        let mut conn = self.client.get_multiplexed_async_connection().await.map_err(StoreError::Redis)?;
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(StoreError::Redis)?;
        Ok(())
    }
}

/// Process-local job records. No expiry; contents die with the process.
#[derive(Default)]
pub struct MemoryStore {
    jobs: RwLock<HashMap<Uuid, ProcessingJob>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn remove(&self, id: Uuid) {
        self.jobs.write().await.remove(&id);
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl KvBackend for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, id: Uuid) -> Result<Option<ProcessingJob>, StoreError> {
        Ok(self.jobs.read().await.get(&id).cloned())
    }

    async fn put(&self, job: &ProcessingJob, _ttl: Duration) -> Result<(), StoreError> {
        self.jobs.write().await.insert(job.id, job.clone());
        Ok(())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Job store with a fixed primary backend and an in-memory fallback.
///
/// The primary is chosen once at construction. Any primary error on `get`
/// or `put` is logged and served from the fallback instead; callers never
/// see backend failures.
#[derive(Clone)]
pub struct JobStore {
    primary: Option<Arc<dyn KvBackend>>,
    fallback: Arc<MemoryStore>,
    ttl: Duration,
}

impl JobStore {
    /// Store that only ever uses process memory.
    pub fn in_memory() -> Self {
        Self {
            primary: None,
            fallback: Arc::new(MemoryStore::new()),
            ttl: DEFAULT_JOB_TTL,
        }
    }

    /// Store with an explicit primary backend.
    pub fn with_backend(primary: Arc<dyn KvBackend>, ttl: Duration) -> Self {
        Self {
            primary: Some(primary),
            fallback: Arc::new(MemoryStore::new()),
            ttl,
        }
    }

    /// Pick the backend for this process: Redis when a URL is given and the
    /// server answers PING, otherwise memory only.
    pub async fn connect(redis_url: Option<&str>, ttl: Duration) -> Self {
        let Some(url) = redis_url else {
            tracing::info!("No Redis URL configured, using in-memory job store");
            return Self::in_memory();
        };

        let store = match RedisStore::new(url) {
            Ok(store) => store,
            Err(e) => {
                tracing::warn!(error = %e, "Invalid Redis URL, using in-memory job store");
                return Self::in_memory();
            }
        };

        match store.health_check().await {
            Ok(()) => {
                tracing::info!("Redis job store initialized");
                Self::with_backend(Arc::new(store), ttl)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Redis unreachable, using in-memory job store");
                Self::in_memory()
            }
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.primary.as_ref().map_or("memory", |p| p.name())
    }

    /// Look up a job. Absent ids return `None`.
    ///
    /// When both the primary and the fallback hold a record, the most
    /// recently updated one wins.
    pub async fn get(&self, id: Uuid) -> Option<ProcessingJob> {
        let local = self.fallback.get(id).await.ok().flatten();
        let Some(primary) = &self.primary else {
            return local;
        };

        match primary.get(id).await {
            Ok(Some(stored)) => match local {
                Some(local) if local.updated_at() > stored.updated_at() => {
                    metrics::counter!("job_store_fallback_total", "op" => "get").increment(1);
                    Some(local)
                }
                _ => Some(stored),
            },
            Ok(None) => local,
            Err(e) => {
                tracing::error!(job_id = %id, backend = primary.name(), error = %e, "Error getting job, using fallback");
                metrics::counter!("job_store_fallback_total", "op" => "get").increment(1);
                local
            }
        }
    }

    /// Persist a job under its id.
    pub async fn put(&self, job: &ProcessingJob) -> Result<(), StoreError> {
        if let Some(primary) = &self.primary {
            match primary.put(job, self.ttl).await {
                Ok(()) => {
                    self.fallback.remove(job.id).await;
                    return Ok(());
                }
                Err(e) => {
                    tracing::error!(job_id = %job.id, backend = primary.name(), error = %e, "Error setting job, using fallback");
                    metrics::counter!("job_store_fallback_total", "op" => "put").increment(1);
                }
            }
        }
        self.fallback.put(job, self.ttl).await
    }

    /// Check the primary backend (for health checks).
    pub async fn health_check(&self) -> Result<(), StoreError> {
        match &self.primary {
            Some(primary) => primary.health_check().await,
            None => Ok(()),
        }
    }

    /// Number of records currently held in process memory.
    pub async fn fallback_len(&self) -> usize {
        self.fallback.len().await
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}
