use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Json conversion(Serde) error: {0}")]
    Serde(String),

    #[error("Database error: {0}")]
    Database(String),

    /// The cache entry could not be removed, so the mutation was not applied
    #[error("Cache invalidation failed: {0}")]
    Invalidation(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl From<redis::RedisError> for StorageError {
    fn from(err: redis::RedisError) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serde(err.to_string())
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display() {
        // Given a StorageError with a Storage variant
        let error = StorageError::Storage("Connection failed".to_string());

        // When converting to a string
        let error_string = error.to_string();

        // Then it should format correctly
        assert_eq!(error_string, "Storage error: Connection failed");
    }

    #[test]
    fn test_invalidation_error_display() {
        let error = StorageError::Invalidation("redis down".to_string());
        assert_eq!(error.to_string(), "Cache invalidation failed: redis down");
    }

    #[test]
    fn test_from_redis_error() {
        // Given a RedisError
        let redis_error =
            redis::RedisError::from((redis::ErrorKind::IoError, "Connection refused"));

        // When converting to StorageError
        let storage_error = StorageError::from(redis_error);

        // Then it should be a Storage variant
        match storage_error {
            StorageError::Storage(msg) => {
                assert!(msg.contains("Connection refused"));
            }
            _ => panic!("Expected Storage variant"),
        }
    }

    #[test]
    fn test_from_serde_error() {
        let serde_error = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();

        let storage_error = StorageError::from(serde_error);

        assert!(matches!(storage_error, StorageError::Serde(_)));
    }

    #[test]
    fn test_from_sqlx_error() {
        let storage_error = StorageError::from(sqlx::Error::RowNotFound);
        assert!(matches!(storage_error, StorageError::Database(_)));
    }

    #[test]
    fn test_error_is_sync_and_send() {
        fn assert_sync_send<T: Sync + Send>() {}
        assert_sync_send::<StorageError>();
    }
}
