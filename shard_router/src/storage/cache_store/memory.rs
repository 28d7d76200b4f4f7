use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::storage::errors::StorageError;

use super::types::{CacheData, CacheStore, InMemoryCacheStore};

const CACHE_PREFIX: &str = "cache";

impl InMemoryCacheStore {
    pub fn new() -> Self {
        tracing::info!("Creating new in-memory generic cache store");
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn make_key(key: &str) -> String {
        format!("{CACHE_PREFIX}:{key}")
    }

    /// Number of stored entries, expired ones included until next write.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

impl Default for InMemoryCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn init(&self) -> Result<(), StorageError> {
        Ok(()) // Nothing to initialize for in-memory store
    }

    async fn put_with_ttl(
        &self,
        key: &str,
        value: CacheData,
        ttl_secs: u64,
    ) -> Result<(), StorageError> {
        let now = Instant::now();
        let expires_at = now
            .checked_add(Duration::from_secs(ttl_secs))
            .unwrap_or(now + Duration::from_secs(u32::MAX as u64));

        let mut entries = self.entries.write().await;
        entries.retain(|_, (_, expiry)| *expiry > now);
        entries.insert(Self::make_key(key), (value, expires_at));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<CacheData>, StorageError> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(&Self::make_key(key))
            .filter(|(_, expiry)| *expiry > Instant::now())
            .map(|(data, _)| data.clone()))
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.write().await.remove(&Self::make_key(key));
        Ok(())
    }
}
