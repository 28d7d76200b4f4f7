use thiserror::Error;

use crate::id::IdError;
use crate::shard::ShardError;

/// Failures of routing and actor dispatch.
///
/// Lifecycle outcomes (already consumed, reuse detected, ...) are not errors
/// and never appear here.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RoutingError {
    /// Malformed composite id or tenant id; a caller error, never retried
    #[error("invalid_key_format: {0}")]
    InvalidKeyFormat(String),

    /// No shard configuration could be resolved; retry with backoff
    #[error("routing_unavailable: {0}")]
    RoutingUnavailable(String),

    /// The actor did not answer. For mutations the outcome is unknown
    #[error("actor_unavailable: {0}")]
    ActorUnavailable(String),
}

impl RoutingError {
    /// Whether an idempotent operation may be retried after this error.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::InvalidKeyFormat(_))
    }
}

impl From<IdError> for RoutingError {
    fn from(err: IdError) -> Self {
        Self::InvalidKeyFormat(err.to_string())
    }
}

impl From<ShardError> for RoutingError {
    fn from(err: ShardError) -> Self {
        match err {
            ShardError::UnknownRegion(_) => Self::InvalidKeyFormat(err.to_string()),
            _ => Self::RoutingUnavailable(err.to_string()),
        }
    }
}
