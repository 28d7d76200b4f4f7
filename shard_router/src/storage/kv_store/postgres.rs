use sqlx::{Pool, Postgres};

use crate::storage::errors::StorageError;
use crate::storage::schema_validation::validate_postgres_table_schema;

use super::store_type::StoredValue;

pub(super) async fn create_kv_table_postgres(
    pool: &Pool<Postgres>,
    table_name: &str,
) -> Result<(), StorageError> {
    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table_name} (
            entry_key TEXT PRIMARY KEY,
            entry_value TEXT NOT NULL,
            expires_at BIGINT
        )
        "#
    ))
    .execute(pool)
    .await?;

    Ok(())
}

pub(super) async fn validate_kv_table_postgres(
    pool: &Pool<Postgres>,
    table_name: &str,
) -> Result<(), StorageError> {
    let expected_columns = [
        ("entry_key", "text"),
        ("entry_value", "text"),
        ("expires_at", "bigint"),
    ];
    validate_postgres_table_schema(pool, table_name, &expected_columns, StorageError::Database)
        .await
}

pub(super) async fn get_entry_postgres(
    pool: &Pool<Postgres>,
    table_name: &str,
    key: &str,
    now_ms: i64,
) -> Result<Option<StoredValue>, StorageError> {
    let row = sqlx::query_as::<_, (String, Option<i64>)>(&format!(
        r#"
        SELECT entry_value, expires_at FROM {table_name}
        WHERE entry_key = $1 AND (expires_at IS NULL OR expires_at > $2)
        "#
    ))
    .bind(key)
    .bind(now_ms)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(StoredValue::from_row))
}

pub(super) async fn put_entry_postgres(
    pool: &Pool<Postgres>,
    table_name: &str,
    key: &str,
    value: &str,
    expires_at_ms: Option<i64>,
) -> Result<(), StorageError> {
    sqlx::query(&format!(
        r#"
        INSERT INTO {table_name} (entry_key, entry_value, expires_at)
        VALUES ($1, $2, $3)
        ON CONFLICT (entry_key) DO UPDATE SET
            entry_value = EXCLUDED.entry_value,
            expires_at = EXCLUDED.expires_at
        "#
    ))
    .bind(key)
    .bind(value)
    .bind(expires_at_ms)
    .execute(pool)
    .await?;

    Ok(())
}

pub(super) async fn delete_entry_postgres(
    pool: &Pool<Postgres>,
    table_name: &str,
    key: &str,
) -> Result<bool, StorageError> {
    let result = sqlx::query(&format!("DELETE FROM {table_name} WHERE entry_key = $1"))
        .bind(key)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub(super) async fn purge_expired_postgres(
    pool: &Pool<Postgres>,
    table_name: &str,
    now_ms: i64,
) -> Result<u64, StorageError> {
    let result = sqlx::query(&format!(
        "DELETE FROM {table_name} WHERE expires_at IS NOT NULL AND expires_at <= $1"
    ))
    .bind(now_ms)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
