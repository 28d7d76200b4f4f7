use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shard_router::{
    CacheAsideStore, CacheStore, DurableStore, InMemoryCacheStore, KvStore, RoutingSettings,
    StorageError, StoredValue, open_data_store,
};

use crate::common::{OTHER_TENANT, TENANT, TestPlatform};

/// SQLite-backed store whose mutations can be made to fail.
struct UnreliableDurable {
    inner: KvStore,
    failing: AtomicBool,
}

impl UnreliableDurable {
    async fn open() -> Self {
        let data_store = open_data_store("sqlite", "sqlite::memory:").unwrap();
        let inner = KvStore::new(data_store, "unreliable_kv").unwrap();
        inner.init().await.unwrap();
        Self {
            inner,
            failing: AtomicBool::new(false),
        }
    }

    fn check(&self) -> Result<(), StorageError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::Database("disk unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DurableStore for UnreliableDurable {
    async fn init(&self) -> Result<(), StorageError> {
        self.inner.init().await
    }

    async fn get(&self, key: &str, now: DateTime<Utc>) -> Result<Option<StoredValue>, StorageError> {
        self.inner.get(key, now).await
    }

    async fn put(
        &self,
        key: &str,
        value: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), StorageError> {
        self.check()?;
        self.inner.put(key, value, expires_at).await
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        self.check()?;
        self.inner.delete(key).await
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StorageError> {
        self.inner.purge_expired(now).await
    }
}

/// A failed durable delete must not leave a stale value in the cache
#[tokio::test]
async fn test_failed_delete_leaves_cache_consistent() {
    // Given a value that a read has copied into the cache
    let cache = Arc::new(InMemoryCacheStore::new());
    let durable = Arc::new(UnreliableDurable::open().await);
    let store = CacheAsideStore::new(cache.clone(), durable.clone(), 300);

    store.set("profile:1", "v1", None).await.unwrap();
    assert_eq!(store.get("profile:1").await.unwrap().as_deref(), Some("v1"));
    assert!(cache.get("profile:1").await.unwrap().is_some());

    // When the durable delete fails
    durable.failing.store(true, Ordering::SeqCst);
    let result = store.delete("profile:1").await;
    assert!(matches!(result, Err(StorageError::Database(_))));

    // Then the cache is empty or agrees with the durable store
    let durable_value = durable.get("profile:1", Utc::now()).await.unwrap();
    match cache.get("profile:1").await.unwrap() {
        None => {}
        Some(cached) => assert_eq!(Some(cached.value), durable_value.map(|v| v.value)),
    }
    assert_eq!(store.get("profile:1").await.unwrap().as_deref(), Some("v1"));
}

#[tokio::test]
async fn test_failed_write_keeps_previous_value() {
    let cache = Arc::new(InMemoryCacheStore::new());
    let durable = Arc::new(UnreliableDurable::open().await);
    let store = CacheAsideStore::new(cache.clone(), durable.clone(), 300);

    store.set("profile:1", "v1", None).await.unwrap();
    store.get("profile:1").await.unwrap();

    durable.failing.store(true, Ordering::SeqCst);
    assert!(store.set("profile:1", "v2", None).await.is_err());
    durable.failing.store(false, Ordering::SeqCst);

    assert_eq!(store.get("profile:1").await.unwrap().as_deref(), Some("v1"));
}

/// Coordinator entities are scoped per tenant and cached after the first read
#[tokio::test]
async fn test_coordinator_entities() {
    let cache = Arc::new(InMemoryCacheStore::new());
    let durable = Arc::new(UnreliableDurable::open().await);
    let entities = CacheAsideStore::new(cache.clone(), durable, 300);
    let platform = TestPlatform::with_entities(RoutingSettings::default(), entities);
    let coordinator = &platform.coordinator;

    coordinator
        .put_entity(TENANT, "tenant_settings", r#"{"mfa":true}"#, None)
        .await
        .unwrap();
    assert_eq!(
        coordinator
            .get_entity(TENANT, "tenant_settings")
            .await
            .unwrap()
            .as_deref(),
        Some(r#"{"mfa":true}"#)
    );
    assert!(cache.get("acme:tenant_settings").await.unwrap().is_some());

    assert_eq!(
        coordinator
            .get_entity(OTHER_TENANT, "tenant_settings")
            .await
            .unwrap(),
        None
    );

    assert!(coordinator.delete_entity(TENANT, "tenant_settings").await.unwrap());
    assert!(cache.get("acme:tenant_settings").await.unwrap().is_none());
}

#[tokio::test]
async fn test_session_keys_route_to_session_actors() {
    let platform = TestPlatform::start().await;
    let coordinator = &platform.coordinator;

    let session_id = coordinator
        .put_session(TENANT, "user-1", "payload")
        .await
        .unwrap();
    let key = format!("session:{session_id}");

    assert_eq!(
        coordinator.get_entity(TENANT, &key).await.unwrap().as_deref(),
        Some("payload")
    );
    assert!(coordinator.delete_entity(TENANT, &key).await.unwrap());
    assert_eq!(coordinator.get_session(TENANT, &session_id).await.unwrap(), None);
}
