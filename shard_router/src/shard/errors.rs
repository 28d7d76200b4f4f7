use thiserror::Error;

/// Errors from shard configuration and region resolution.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ShardError {
    /// A region key that is not in the known-region table
    #[error("Unknown region: {0}")]
    UnknownRegion(String),

    /// A configuration document that cannot be used as a whole
    #[error("Invalid region shard config: {0}")]
    InvalidConfig(String),

    /// A shard index outside the configured shard space
    #[error("Shard index {index} out of range (total shards: {total})")]
    ShardOutOfRange { index: u32, total: u32 },

    /// The configuration store could not be reached
    #[error("Config store error: {0}")]
    ConfigStore(String),

    /// No configuration could be resolved and no fallback is permitted
    #[error("Region shard config unavailable for tenant {0}")]
    Unavailable(String),
}

impl From<redis::RedisError> for ShardError {
    fn from(err: redis::RedisError) -> Self {
        Self::ConfigStore(err.to_string())
    }
}

impl From<serde_json::Error> for ShardError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidConfig(err.to_string())
    }
}
