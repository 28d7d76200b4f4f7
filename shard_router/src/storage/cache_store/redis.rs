use async_trait::async_trait;
use redis::{self, AsyncCommands};

use crate::storage::errors::StorageError;

use super::types::{CacheData, CacheStore, RedisCacheStore};

const CACHE_PREFIX: &str = "cache";

impl RedisCacheStore {
    pub fn open(url: &str) -> Result<Self, StorageError> {
        let client = redis::Client::open(url)?;
        Ok(Self { client })
    }

    fn make_key(key: &str) -> String {
        format!("{CACHE_PREFIX}:{key}")
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn init(&self) -> Result<(), StorageError> {
        // Verify the connection works
        let _conn = self.client.get_multiplexed_async_connection().await?;
        Ok(())
    }

    async fn put_with_ttl(
        &self,
        key: &str,
        value: CacheData,
        ttl_secs: u64,
    ) -> Result<(), StorageError> {
        if ttl_secs == 0 {
            return self.remove(key).await;
        }

        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let key = Self::make_key(key);
        let value = serde_json::to_string(&value)?;
        let _: () = conn.set_ex(&key, value, ttl_secs).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<CacheData>, StorageError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let key = Self::make_key(key);
        let value: Option<String> = conn.get(&key).await?;

        match value {
            Some(v) => Ok(Some(serde_json::from_str(&v)?)),
            None => Ok(None),
        }
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let key = Self::make_key(key);
        let _: () = conn.del(&key).await?;
        Ok(())
    }
}
