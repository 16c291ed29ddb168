use async_trait::async_trait;
use deadpool_redis::{Pool, PoolConfig, Runtime};
use tracing::debug;

use super::{FileSetResolver, LookupError, decode_file_list};
use crate::archive::FileDescriptor;
use crate::config::ConfigError;

/// Prefix of the keys the upstream application writes file lists under
pub const KEY_PREFIX: &str = "zip:";

/// Looks up file lists stored in Redis as JSON under `zip:{reference}`.
///
/// Connections come from a bounded pool. Each checkout of an idle connection
/// is health-checked by the pool; a dead connection fails that lookup only.
#[derive(Clone)]
pub struct RedisResolver {
    pool: Pool,
}

impl RedisResolver {
    pub fn new(pool: Pool) -> Self {
        RedisResolver { pool }
    }

    /// Create the pool. No connection is made until the first lookup.
    pub fn connect(url: &str, max_size: usize) -> Result<Self, ConfigError> {
        let mut cfg = deadpool_redis::Config::from_url(url);
        cfg.pool = Some(PoolConfig::new(max_size));
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| ConfigError::Redis(e.to_string()))?;
        Ok(Self::new(pool))
    }

    pub fn key_for(reference: &str) -> String {
        format!("{KEY_PREFIX}{reference}")
    }
}

#[async_trait]
impl FileSetResolver for RedisResolver {
    async fn resolve(&self, reference: &str) -> Result<Vec<FileDescriptor>, LookupError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| LookupError::Store(e.to_string()))?;

        let key = Self::key_for(reference);
        let raw: Option<Vec<u8>> = deadpool_redis::redis::cmd("GET")
            .arg(&key)
            .query_async(&mut conn)
            .await
            .map_err(|e| LookupError::Store(e.to_string()))?;

        let raw = raw.ok_or_else(|| LookupError::NotFound {
            reference: reference.to_string(),
        })?;

        let files = decode_file_list(&raw)?;
        debug!(key = %key, files = files.len(), "file list resolved");
        Ok(files)
    }
}
