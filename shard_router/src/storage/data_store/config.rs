use std::str::FromStr;

use super::types::{DataStore, PostgresDataStore, SqliteDataStore};
use crate::storage::errors::StorageError;

/// Create a lazily connecting pool for `store_type`.
pub fn open_data_store(store_type: &str, store_url: &str) -> Result<Box<dyn DataStore>, StorageError> {
    tracing::info!("Initializing data store with type: {}", store_type);

    let store: Box<dyn DataStore> = match store_type {
        "sqlite" => {
            let opts = sqlx::sqlite::SqliteConnectOptions::from_str(store_url)?
                .create_if_missing(true);

            // Every connection to an in-memory database sees its own database
            let max_connections = if store_url.contains(":memory:") { 1 } else { 10 };

            Box::new(SqliteDataStore {
                pool: sqlx::sqlite::SqlitePoolOptions::new()
                    .max_connections(max_connections)
                    .connect_lazy_with(opts),
            })
        }
        "postgres" => Box::new(PostgresDataStore {
            pool: sqlx::PgPool::connect_lazy(store_url)?,
        }),
        t => {
            return Err(StorageError::Config(format!(
                "Unsupported store type: {t}. Supported types are 'sqlite' and 'postgres'"
            )));
        }
    };

    tracing::info!("Created data store pool: type={}", store_type);
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_sqlite_memory() {
        let store = open_data_store("sqlite", "sqlite::memory:").unwrap();
        assert!(store.as_sqlite().is_some());
        assert!(store.as_postgres().is_none());
    }

    #[tokio::test]
    async fn test_unsupported_store_type() {
        let err = open_data_store("mysql", "mysql://localhost").err().unwrap();
        assert!(matches!(err, StorageError::Config(msg) if msg.contains("Unsupported store type")));
    }
}
