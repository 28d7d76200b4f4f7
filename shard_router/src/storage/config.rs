//! Storage backend selection

use std::env;
use std::sync::LazyLock;

pub static STORAGE_SETTINGS: LazyLock<StorageSettings> = LazyLock::new(StorageSettings::from_env);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageSettings {
    /// `GENERIC_CACHE_STORE_TYPE`: `memory` (default) or `redis`
    pub cache_store_type: String,
    /// `GENERIC_CACHE_STORE_URL`
    pub cache_store_url: String,
    /// `GENERIC_DATA_STORE_TYPE`: `sqlite` (default) or `postgres`
    pub data_store_type: String,
    /// `GENERIC_DATA_STORE_URL` (default `sqlite::memory:`)
    pub data_store_url: String,
    /// `DB_TABLE_PREFIX` (default `sr_`)
    pub table_prefix: String,
    /// `DB_TABLE_KV_ENTRIES` (default `{prefix}kv_entries`)
    pub kv_table: String,
    /// `CACHE_ASIDE_TTL_SECS` (default 300), upper bound for cached entries
    pub cache_ttl_secs: u64,
}

impl StorageSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let table_prefix = lookup("DB_TABLE_PREFIX").unwrap_or_else(|| "sr_".to_string());
        let kv_table =
            lookup("DB_TABLE_KV_ENTRIES").unwrap_or_else(|| format!("{table_prefix}kv_entries"));

        let cache_ttl_secs = match lookup("CACHE_ASIDE_TTL_SECS") {
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                tracing::warn!("Invalid value for CACHE_ASIDE_TTL_SECS: {:?}, using 300", raw);
                300
            }),
            None => 300,
        };

        Self {
            cache_store_type: lookup("GENERIC_CACHE_STORE_TYPE")
                .unwrap_or_else(|| "memory".to_string()),
            cache_store_url: lookup("GENERIC_CACHE_STORE_URL").unwrap_or_default(),
            data_store_type: lookup("GENERIC_DATA_STORE_TYPE")
                .unwrap_or_else(|| "sqlite".to_string()),
            data_store_url: lookup("GENERIC_DATA_STORE_URL")
                .unwrap_or_else(|| "sqlite::memory:".to_string()),
            table_prefix,
            kv_table,
            cache_ttl_secs,
        }
    }
}
