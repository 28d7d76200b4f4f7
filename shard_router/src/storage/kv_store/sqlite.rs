use sqlx::{Pool, Sqlite};

use crate::storage::errors::StorageError;
use crate::storage::schema_validation::validate_sqlite_table_schema;

use super::store_type::StoredValue;

pub(super) async fn create_kv_table_sqlite(
    pool: &Pool<Sqlite>,
    table_name: &str,
) -> Result<(), StorageError> {
    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table_name} (
            entry_key TEXT PRIMARY KEY,
            entry_value TEXT NOT NULL,
            expires_at INTEGER
        )
        "#
    ))
    .execute(pool)
    .await?;

    Ok(())
}

pub(super) async fn validate_kv_table_sqlite(
    pool: &Pool<Sqlite>,
    table_name: &str,
) -> Result<(), StorageError> {
    let expected_columns = [
        ("entry_key", "TEXT"),
        ("entry_value", "TEXT"),
        ("expires_at", "INTEGER"),
    ];
    validate_sqlite_table_schema(pool, table_name, &expected_columns, StorageError::Database).await
}

pub(super) async fn get_entry_sqlite(
    pool: &Pool<Sqlite>,
    table_name: &str,
    key: &str,
    now_ms: i64,
) -> Result<Option<StoredValue>, StorageError> {
    let row = sqlx::query_as::<_, (String, Option<i64>)>(&format!(
        r#"
        SELECT entry_value, expires_at FROM {table_name}
        WHERE entry_key = ? AND (expires_at IS NULL OR expires_at > ?)
        "#
    ))
    .bind(key)
    .bind(now_ms)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(StoredValue::from_row))
}

pub(super) async fn put_entry_sqlite(
    pool: &Pool<Sqlite>,
    table_name: &str,
    key: &str,
    value: &str,
    expires_at_ms: Option<i64>,
) -> Result<(), StorageError> {
    sqlx::query(&format!(
        r#"
        INSERT INTO {table_name} (entry_key, entry_value, expires_at)
        VALUES (?, ?, ?)
        ON CONFLICT(entry_key) DO UPDATE SET
            entry_value = excluded.entry_value,
            expires_at = excluded.expires_at
        "#
    ))
    .bind(key)
    .bind(value)
    .bind(expires_at_ms)
    .execute(pool)
    .await?;

    Ok(())
}

pub(super) async fn delete_entry_sqlite(
    pool: &Pool<Sqlite>,
    table_name: &str,
    key: &str,
) -> Result<bool, StorageError> {
    let result = sqlx::query(&format!("DELETE FROM {table_name} WHERE entry_key = ?"))
        .bind(key)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub(super) async fn purge_expired_sqlite(
    pool: &Pool<Sqlite>,
    table_name: &str,
    now_ms: i64,
) -> Result<u64, StorageError> {
    let result = sqlx::query(&format!(
        "DELETE FROM {table_name} WHERE expires_at IS NOT NULL AND expires_at <= ?"
    ))
    .bind(now_ms)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
