use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::storage::data_store::DataStore;
use crate::storage::errors::StorageError;

use super::postgres::*;
use super::sqlite::*;

/// A durable value together with its expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredValue {
    pub value: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl StoredValue {
    pub(super) fn from_row((value, expires_at_ms): (String, Option<i64>)) -> Self {
        Self {
            value,
            expires_at: expires_at_ms.and_then(DateTime::from_timestamp_millis),
        }
    }

    /// Seconds until expiry, `None` for values that never expire.
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> Option<u64> {
        self.expires_at
            .map(|at| u64::try_from((at - now).num_seconds()).unwrap_or(0))
    }
}

/// Source of truth behind the cache.
#[async_trait]
pub trait DurableStore: Send + Sync + 'static {
    async fn init(&self) -> Result<(), StorageError>;

    /// Value for `key`; expired rows are never returned.
    async fn get(&self, key: &str, now: DateTime<Utc>) -> Result<Option<StoredValue>, StorageError>;

    async fn put(
        &self,
        key: &str,
        value: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), StorageError>;

    /// Returns whether a row was removed.
    async fn delete(&self, key: &str) -> Result<bool, StorageError>;

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StorageError>;
}

/// Key/value table in the configured SQL database.
pub struct KvStore {
    store: Box<dyn DataStore>,
    table_name: String,
}

impl KvStore {
    pub fn new(store: Box<dyn DataStore>, table_name: &str) -> Result<Self, StorageError> {
        if table_name.is_empty()
            || !table_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(StorageError::Config(format!(
                "Invalid table name: {table_name:?}"
            )));
        }

        Ok(Self {
            store,
            table_name: table_name.to_string(),
        })
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }
}

fn unsupported() -> StorageError {
    StorageError::Database("Unsupported database type".to_string())
}

#[async_trait]
impl DurableStore for KvStore {
    async fn init(&self) -> Result<(), StorageError> {
        let table = self.table_name.as_str();
        match (self.store.as_sqlite(), self.store.as_postgres()) {
            (Some(pool), _) => {
                create_kv_table_sqlite(pool, table).await?;
                validate_kv_table_sqlite(pool, table).await
            }
            (_, Some(pool)) => {
                create_kv_table_postgres(pool, table).await?;
                validate_kv_table_postgres(pool, table).await
            }
            _ => Err(unsupported()),
        }?;

        tracing::info!("Durable key/value table {} ready", table);
        Ok(())
    }

    async fn get(&self, key: &str, now: DateTime<Utc>) -> Result<Option<StoredValue>, StorageError> {
        let now_ms = now.timestamp_millis();
        if let Some(pool) = self.store.as_sqlite() {
            get_entry_sqlite(pool, &self.table_name, key, now_ms).await
        } else if let Some(pool) = self.store.as_postgres() {
            get_entry_postgres(pool, &self.table_name, key, now_ms).await
        } else {
            Err(unsupported())
        }
    }

    async fn put(
        &self,
        key: &str,
        value: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), StorageError> {
        let expires_at_ms = expires_at.map(|at| at.timestamp_millis());
        if let Some(pool) = self.store.as_sqlite() {
            put_entry_sqlite(pool, &self.table_name, key, value, expires_at_ms).await
        } else if let Some(pool) = self.store.as_postgres() {
            put_entry_postgres(pool, &self.table_name, key, value, expires_at_ms).await
        } else {
            Err(unsupported())
        }
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        if let Some(pool) = self.store.as_sqlite() {
            delete_entry_sqlite(pool, &self.table_name, key).await
        } else if let Some(pool) = self.store.as_postgres() {
            delete_entry_postgres(pool, &self.table_name, key).await
        } else {
            Err(unsupported())
        }
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StorageError> {
        let now_ms = now.timestamp_millis();
        let purged = if let Some(pool) = self.store.as_sqlite() {
            purge_expired_sqlite(pool, &self.table_name, now_ms).await
        } else if let Some(pool) = self.store.as_postgres() {
            purge_expired_postgres(pool, &self.table_name, now_ms).await
        } else {
            Err(unsupported())
        }?;

        if purged > 0 {
            tracing::debug!("Purged {} expired rows from {}", purged, self.table_name);
        }
        Ok(purged)
    }
}
