use std::sync::Arc;

use super::types::{CacheStore, InMemoryCacheStore, RedisCacheStore};
use crate::storage::errors::StorageError;

/// Build and initialise the cache store selected by `store_type`.
pub async fn open_cache_store(
    store_type: &str,
    store_url: &str,
) -> Result<Arc<dyn CacheStore>, StorageError> {
    tracing::info!("Initializing cache store with type: {}", store_type);

    let store: Arc<dyn CacheStore> = match store_type {
        "memory" => Arc::new(InMemoryCacheStore::new()),
        "redis" => Arc::new(RedisCacheStore::open(store_url)?),
        t => {
            return Err(StorageError::Config(format!(
                "Unsupported cache store type: {t}. Supported types are 'memory' and 'redis'"
            )));
        }
    };

    if let Err(e) = store.init().await {
        tracing::error!("Failed to connect to cache store: {}", e);
        return Err(e);
    }

    tracing::info!("Connected to cache store: type={}", store_type);
    Ok(store)
}
