//! Cache-aside access for data that is not actor-owned
//!
//! Reads go to the cache first and fall through to the durable store, filling
//! the cache on the way back. Mutations delete the cache entry first and abort
//! if that fails, then change the durable store, then delete the cache entry a
//! second time. The second delete removes a stale value a concurrent reader may
//! have put back between the first delete and the durable write.

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

use super::cache_store::{CacheData, CacheStore, open_cache_store};
use super::config::StorageSettings;
use super::data_store::open_data_store;
use super::errors::StorageError;
use super::kv_store::{DurableStore, KvStore};

pub struct CacheAsideStore {
    cache: Arc<dyn CacheStore>,
    durable: Arc<dyn DurableStore>,
    cache_ttl_secs: u64,
}

impl CacheAsideStore {
    pub fn new(
        cache: Arc<dyn CacheStore>,
        durable: Arc<dyn DurableStore>,
        cache_ttl_secs: u64,
    ) -> Self {
        Self {
            cache,
            durable,
            cache_ttl_secs,
        }
    }

    /// Open both backends described by `settings` and prepare the table.
    pub async fn from_settings(settings: &StorageSettings) -> Result<Self, StorageError> {
        let cache = open_cache_store(&settings.cache_store_type, &settings.cache_store_url).await?;
        let data_store = open_data_store(&settings.data_store_type, &settings.data_store_url)?;
        let durable = KvStore::new(data_store, &settings.kv_table)?;
        durable.init().await?;

        Ok(Self::new(cache, Arc::new(durable), settings.cache_ttl_secs))
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match self.cache.get(key).await {
            Ok(Some(data)) => return Ok(Some(data.value)),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!("Cache read for {} failed, reading durable store: {}", key, e);
            }
        }

        let now = Utc::now();
        let Some(stored) = self.durable.get(key, now).await? else {
            return Ok(None);
        };

        let ttl = stored
            .remaining_secs(now)
            .map_or(self.cache_ttl_secs, |remaining| remaining.min(self.cache_ttl_secs));
        if ttl > 0 {
            let data = CacheData {
                value: stored.value.clone(),
            };
            if let Err(e) = self.cache.put_with_ttl(key, data, ttl).await {
                tracing::warn!("Failed to populate cache for {}: {}", key, e);
            }
        }

        Ok(Some(stored.value))
    }

    /// Write `value`. With a `ttl` the value stops being served once it elapses.
    pub async fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), StorageError> {
        let expires_at = ttl.map(|ttl| {
            let now = Utc::now();
            TimeDelta::from_std(ttl)
                .ok()
                .and_then(|delta| now.checked_add_signed(delta))
                .unwrap_or(DateTime::<Utc>::MAX_UTC)
        });

        self.invalidate(key).await?;
        self.durable.put(key, value, expires_at).await?;
        self.invalidate_again(key).await;
        Ok(())
    }

    /// Remove `key`. Returns whether the durable store held it.
    pub async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        self.invalidate(key).await?;
        let removed = self.durable.delete(key).await?;
        self.invalidate_again(key).await;
        Ok(removed)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        match self.get(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub async fn set_json<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<(), StorageError> {
        let raw = serde_json::to_string(value)?;
        self.set(key, &raw, ttl).await
    }

    /// Drop expired durable rows.
    pub async fn purge_expired(&self) -> Result<u64, StorageError> {
        self.durable.purge_expired(Utc::now()).await
    }

    async fn invalidate(&self, key: &str) -> Result<(), StorageError> {
        self.cache.remove(key).await.map_err(|e| {
            tracing::error!("Aborting write of {}: cache invalidation failed: {}", key, e);
            StorageError::Invalidation(e.to_string())
        })
    }

    async fn invalidate_again(&self, key: &str) {
        if let Err(e) = self.cache.remove(key).await {
            tracing::warn!("Second invalidation of {} failed: {}", key, e);
        }
    }
}
