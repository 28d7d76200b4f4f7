mod config;
mod memory;
mod redis;
mod types;

pub use config::open_cache_store;
pub use types::{CacheData, CacheStore, InMemoryCacheStore, RedisCacheStore};
