//! shard_router - Geo-sharded actor routing for multi-tenant authentication records
//!
//! This crate places short-lived authentication records (WebAuthn challenges,
//! authorization codes, refresh-token families, sessions, login throttles) on
//! per-region actor instances and finds them again from the id alone, even after
//! a tenant is resharded. Each actor instance serializes access to its records,
//! which is what makes single-use consumption and refresh-token rotation atomic.
//!
//! Records no actor owns go through a cache-aside store over Redis or memory and
//! SQLite or PostgreSQL.

mod actor;
mod actors;
mod config;
mod coordination;
mod guard;
mod id;
mod router;
mod shard;
mod storage;
mod utils;

#[cfg(test)]
mod test_utils;

pub use actor::{Actor, ActorHost, Clock, HostSettings, system_clock};
pub use actors::{
    RateLimitConfig, RateLimitMessage, RateLimitReply, RateLimiterActor, RefreshConfig,
    RefreshMessage, RefreshReply, RefreshTokenActor, SessionActor, SessionConfig, SessionMessage,
    SessionReply, SingleUseActor, SingleUseConfig, SingleUseMessage, SingleUseReply,
};
pub use config::{ROUTING_SETTINGS, RoutingSettings};
pub use coordination::{CoordinationError, IssuedRecord, ShardCoordinator};
pub use guard::{
    AttemptThrottle, ConsumeOutcome, FamilyLedger, FamilyState, FamilyStatus, RotationOutcome,
    SingleUseLedger, ThrottleConfig, ThrottleStatus,
};
pub use id::{
    CompositeId, IdError, RecordId, decode as decode_composite_id, encode as encode_composite_id,
    is_composite_format,
};
pub use router::{ActorHandle, ActorKind, ActorRouter, RouteTarget, RoutedRecord, RoutingError};
pub use shard::{
    CAPABLE_REGIONS, ConfigSource, ConfigStore, InMemoryConfigStore, RedisConfigStore, RegionKey,
    RegionShardConfig, RegionShardDocument, RegionShardResolver, RegionShards, ResolverSettings,
    ShardError, ShardKeyStrategy, config_key, fnv1a_32, hash as shard_hash, shard_index,
};
pub use storage::{
    CacheAsideStore, CacheData, CacheStore, DataStore, DurableStore, InMemoryCacheStore, KvStore,
    PostgresDataStore, RedisCacheStore, STORAGE_SETTINGS, SqliteDataStore, StorageError,
    StorageSettings, StoredValue, open_cache_store, open_data_store,
};

/// Build the process-wide coordinator from the environment
///
/// Opens the configured cache and data stores, prepares the entity table and
/// connects the tenant config store when one is configured.
pub async fn init() -> Result<ShardCoordinator, CoordinationError> {
    let coordinator = ShardCoordinator::from_env().await?;
    tracing::info!(
        "Shard router ready: default region {}, {} shards",
        coordinator.settings().default_region,
        coordinator.settings().default_shard_count
    );
    Ok(coordinator)
}
