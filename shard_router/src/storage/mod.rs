//! Storage backends
//!
//! A cache store (in-memory or Redis) in front of a durable key/value table
//! (SQLite or PostgreSQL), combined by [`CacheAsideStore`].

mod cache_aside;
mod cache_store;
mod config;
mod data_store;
mod errors;
mod kv_store;
mod schema_validation;

pub use cache_aside::CacheAsideStore;
pub use cache_store::{CacheData, CacheStore, InMemoryCacheStore, RedisCacheStore, open_cache_store};
pub use config::{STORAGE_SETTINGS, StorageSettings};
pub use data_store::{DataStore, PostgresDataStore, SqliteDataStore, open_data_store};
pub use errors::StorageError;
pub use kv_store::{DurableStore, KvStore, StoredValue};
