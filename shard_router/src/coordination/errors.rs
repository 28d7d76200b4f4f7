//! Error types for the coordination layer

use thiserror::Error;

use crate::router::RoutingError;
use crate::storage::StorageError;
use crate::utils::UtilError;

/// Errors returned by [`ShardCoordinator`](super::ShardCoordinator) operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoordinationError {
    /// Routing or actor dispatch failed
    #[error("Routing error: {0}")]
    Routing(RoutingError),

    /// Cache-aside storage failed
    #[error("Storage error: {0}")]
    Storage(StorageError),

    /// A superseded refresh token was presented; its family is revoked
    #[error("Refresh token reuse detected")]
    ReuseDetected,

    /// Too many failed attempts from this identifier
    #[error("Rate limited, retry after {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: u64 },

    /// The presented grant (code, challenge or token) cannot be used
    #[error("Invalid grant: {0}")]
    InvalidGrant(String),

    /// Error from utils operations
    #[error("Utils error: {0}")]
    UtilsError(UtilError),

    /// An actor answered with something the caller did not ask for
    #[error("Coordination error: {0}")]
    Coordination(String),
}

impl CoordinationError {
    /// Log the error and return self
    pub fn log(self) -> Self {
        match &self {
            Self::Routing(err) => tracing::error!("Routing error: {}", err),
            Self::Storage(err) => tracing::error!("Storage error: {}", err),
            Self::ReuseDetected => {
                tracing::warn!(security_event = true, "Refresh token reuse detected")
            }
            Self::RateLimited {
                retry_after_seconds,
            } => tracing::info!("Rate limited, retry after {}s", retry_after_seconds),
            Self::InvalidGrant(reason) => tracing::info!("Invalid grant: {}", reason),
            Self::UtilsError(err) => tracing::error!("Utils error: {}", err),
            Self::Coordination(msg) => tracing::error!("Coordination error: {}", msg),
        }
        self
    }

    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Routing(RoutingError::InvalidKeyFormat(_)) => "invalid_key_format",
            Self::Routing(RoutingError::RoutingUnavailable(_)) => "routing_unavailable",
            Self::Routing(RoutingError::ActorUnavailable(_)) => "actor_unavailable",
            Self::Storage(_) => "storage_error",
            Self::ReuseDetected => "reuse_detected",
            Self::RateLimited { .. } => "rate_limited",
            Self::InvalidGrant(_) => "invalid_grant",
            Self::UtilsError(_) | Self::Coordination(_) => "internal_error",
        }
    }

    /// Error code exposed to protocol clients.
    ///
    /// Every reason a presented code, challenge or refresh token was refused
    /// collapses to `invalid_grant` so clients cannot tell them apart.
    pub fn protocol_error(&self) -> &'static str {
        match self {
            Self::ReuseDetected
            | Self::InvalidGrant(_)
            | Self::Routing(RoutingError::InvalidKeyFormat(_)) => "invalid_grant",
            Self::RateLimited { .. } => "slow_down",
            Self::Routing(_) => "temporarily_unavailable",
            Self::Storage(_) | Self::UtilsError(_) | Self::Coordination(_) => "server_error",
        }
    }

    /// Whether the caller may retry the same request later.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Routing(err) => err.is_retryable(),
            Self::RateLimited { .. } => true,
            _ => false,
        }
    }
}

// Custom From implementations that automatically log errors

impl From<RoutingError> for CoordinationError {
    fn from(err: RoutingError) -> Self {
        let error = Self::Routing(err);
        tracing::error!("{}", error);
        error
    }
}

impl From<StorageError> for CoordinationError {
    fn from(err: StorageError) -> Self {
        let error = Self::Storage(err);
        tracing::error!("{}", error);
        error
    }
}

impl From<UtilError> for CoordinationError {
    fn from(err: UtilError) -> Self {
        let error = Self::UtilsError(err);
        tracing::error!("{}", error);
        error
    }
}
