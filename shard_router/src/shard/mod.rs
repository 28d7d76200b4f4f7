mod config;
mod errors;
mod hasher;
mod region;

pub use config::{
    ConfigSource, ConfigStore, InMemoryConfigStore, RedisConfigStore, RegionShardConfig,
    RegionShardDocument, RegionShardResolver, RegionShards, ResolverSettings, config_key,
};
pub use errors::ShardError;
pub use hasher::{ShardKeyStrategy, fnv1a_32, hash, shard_index};
pub use region::{CAPABLE_REGIONS, RegionKey};

#[cfg(test)]
pub(crate) use config::tests::FlakyConfigStore;
