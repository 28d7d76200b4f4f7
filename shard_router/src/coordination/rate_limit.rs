//! Login throttling
//!
//! Identifiers (user handle, client ip, ...) never get a composite id, so they
//! are routed by hashing the identifier itself.

use super::coordinator::{ShardCoordinator, call_idempotent, unexpected_reply};
use super::errors::CoordinationError;
use crate::actors::{RateLimitMessage, RateLimitReply};
use crate::guard::ThrottleStatus;
use crate::router::{ActorHandle, ActorKind};

impl ShardCoordinator {
    /// Count a failed login for `identifier` and return the resulting status.
    pub async fn record_login_failure(
        &self,
        tenant_id: &str,
        identifier: &str,
    ) -> Result<ThrottleStatus, CoordinationError> {
        let handle = self.rate_limit_handle(tenant_id, identifier).await?;

        match self
            .rate_limits
            .call(
                &handle,
                RateLimitMessage::RecordFailure {
                    identifier: identifier.to_string(),
                },
            )
            .await?
        {
            RateLimitReply::Status(status) => Ok(status),
            other => Err(unexpected_reply("record_login_failure", other)),
        }
    }

    /// Fails with [`CoordinationError::RateLimited`] while `identifier` is blocked.
    pub async fn check_login_allowed(
        &self,
        tenant_id: &str,
        identifier: &str,
    ) -> Result<ThrottleStatus, CoordinationError> {
        let handle = self.rate_limit_handle(tenant_id, identifier).await?;

        match call_idempotent(&self.rate_limits, &handle, || RateLimitMessage::Check {
            identifier: identifier.to_string(),
        })
        .await?
        {
            RateLimitReply::Status(status) if status.blocked => {
                Err(CoordinationError::RateLimited {
                    retry_after_seconds: status.retry_after_seconds,
                }
                .log())
            }
            RateLimitReply::Status(status) => Ok(status),
            other => Err(unexpected_reply("check_login_allowed", other)),
        }
    }

    /// Forget the failures of `identifier` after a successful login.
    pub async fn clear_login_failures(
        &self,
        tenant_id: &str,
        identifier: &str,
    ) -> Result<bool, CoordinationError> {
        let handle = self.rate_limit_handle(tenant_id, identifier).await?;

        match self
            .rate_limits
            .call(
                &handle,
                RateLimitMessage::Clear {
                    identifier: identifier.to_string(),
                },
            )
            .await?
        {
            RateLimitReply::Cleared(cleared) => Ok(cleared),
            other => Err(unexpected_reply("clear_login_failures", other)),
        }
    }

    async fn rate_limit_handle(
        &self,
        tenant_id: &str,
        identifier: &str,
    ) -> Result<ActorHandle, CoordinationError> {
        Ok(self
            .router
            .route_key(tenant_id, identifier, ActorKind::RateLimit)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RoutingSettings;
    use crate::guard::ThrottleConfig;
    use crate::test_utils::{test_coordinator, test_coordinator_with};
    use std::time::Duration;

    fn strict_settings() -> RoutingSettings {
        RoutingSettings {
            rate_limit: ThrottleConfig {
                max_attempts: 3,
                window: Duration::from_secs(60),
                block_duration: Duration::from_secs(120),
            },
            ..RoutingSettings::default()
        }
    }

    #[tokio::test]
    async fn test_block_after_max_attempts() {
        // Given a limit of three failures
        let (coordinator, _) = test_coordinator_with(strict_settings()).await;

        // When the identifier fails three times
        for attempt in 1..=2 {
            let status = coordinator
                .record_login_failure("acme", "alice")
                .await
                .unwrap();
            assert!(!status.blocked);
            assert_eq!(status.attempts, attempt);
        }
        let status = coordinator
            .record_login_failure("acme", "alice")
            .await
            .unwrap();

        // Then it is blocked for the configured duration
        assert!(status.blocked);
        assert_eq!(status.retry_after_seconds, 120);

        let err = coordinator
            .check_login_allowed("acme", "alice")
            .await
            .unwrap_err();
        assert_eq!(
            err,
            CoordinationError::RateLimited {
                retry_after_seconds: 120
            }
        );
        assert_eq!(err.protocol_error(), "slow_down");
    }

    #[tokio::test]
    async fn test_block_expires() {
        let (coordinator, clock) = test_coordinator_with(strict_settings()).await;
        for _ in 0..3 {
            coordinator
                .record_login_failure("acme", "alice")
                .await
                .unwrap();
        }

        clock.advance_secs(121);

        let status = coordinator
            .check_login_allowed("acme", "alice")
            .await
            .unwrap();
        assert!(!status.blocked);
    }

    #[tokio::test]
    async fn test_clear_on_success() {
        let (coordinator, _) = test_coordinator().await;
        coordinator
            .record_login_failure("acme", "alice")
            .await
            .unwrap();

        assert!(coordinator.clear_login_failures("acme", "alice").await.unwrap());
        assert!(!coordinator.clear_login_failures("acme", "alice").await.unwrap());

        let status = coordinator
            .check_login_allowed("acme", "alice")
            .await
            .unwrap();
        assert_eq!(status.attempts, 0);
    }

    #[tokio::test]
    async fn test_identifiers_and_tenants_are_independent() {
        let (coordinator, _) = test_coordinator_with(strict_settings()).await;
        for _ in 0..3 {
            coordinator
                .record_login_failure("acme", "alice")
                .await
                .unwrap();
        }

        assert!(coordinator.check_login_allowed("acme", "bob").await.is_ok());
        assert!(coordinator.check_login_allowed("globex", "alice").await.is_ok());
    }
}
