use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Instant;
use tokio::sync::RwLock;

use crate::storage::errors::StorageError;

/// Data stored in the cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheData {
    pub value: String,
}

pub struct InMemoryCacheStore {
    pub(super) entries: RwLock<HashMap<String, (CacheData, Instant)>>,
}

pub struct RedisCacheStore {
    pub(super) client: redis::Client,
}

#[async_trait]
pub trait CacheStore: Send + Sync + 'static {
    /// Initialize the store. This is called when the store is created.
    async fn init(&self) -> Result<(), StorageError>;

    /// Put a value into the store; it disappears after `ttl_secs`.
    async fn put_with_ttl(
        &self,
        key: &str,
        value: CacheData,
        ttl_secs: u64,
    ) -> Result<(), StorageError>;

    /// Get a value that has not expired.
    async fn get(&self, key: &str) -> Result<Option<CacheData>, StorageError>;

    /// Remove a value. Removing a missing key succeeds.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}
