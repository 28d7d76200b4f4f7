//! Challenges and authorization codes: issued once, consumed at most once

use serde::Serialize;

use super::coordinator::{ShardCoordinator, unexpected_reply};
use super::errors::CoordinationError;
use crate::actor::ActorHost;
use crate::actors::{SingleUseActor, SingleUseMessage, SingleUseReply};
use crate::guard::ConsumeOutcome;

/// A freshly issued single-use record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssuedRecord {
    /// Composite id handed to the client
    pub id: String,
    pub expires_in_secs: u64,
}

/// Collapse every refusal into `InvalidGrant`; the reason only reaches the log.
fn grant_payload(
    outcome: ConsumeOutcome,
    what: &str,
    tenant_id: &str,
) -> Result<String, CoordinationError> {
    let reason = match outcome {
        ConsumeOutcome::Consumed(payload) => return Ok(payload),
        ConsumeOutcome::AlreadyConsumed => {
            tracing::warn!(security_event = true, "{} replay for tenant {}", what, tenant_id);
            format!("{what} already used")
        }
        ConsumeOutcome::Expired => format!("{what} expired"),
        ConsumeOutcome::NotFound => format!("unknown {what}"),
    };
    Err(CoordinationError::InvalidGrant(reason))
}

impl ShardCoordinator {
    /// Store a WebAuthn challenge. `shard_key` is usually the user handle.
    pub async fn issue_challenge(
        &self,
        tenant_id: &str,
        shard_key: &str,
        payload: &str,
    ) -> Result<IssuedRecord, CoordinationError> {
        let ttl = self.settings.challenge_ttl_secs;
        self.issue(&self.challenges, tenant_id, shard_key, payload, ttl)
            .await
    }

    /// Consume a challenge. Exactly one concurrent caller gets `Consumed`.
    pub async fn consume_challenge(
        &self,
        tenant_id: &str,
        challenge_id: &str,
    ) -> Result<ConsumeOutcome, CoordinationError> {
        self.consume(&self.challenges, tenant_id, challenge_id).await
    }

    /// Consume a challenge for its payload.
    ///
    /// Like [`redeem_authorization_code`](Self::redeem_authorization_code), a
    /// challenge that was already used, has expired or never existed is an
    /// `InvalidGrant`, so callers cannot tell those cases apart.
    pub async fn verify_challenge(
        &self,
        tenant_id: &str,
        challenge_id: &str,
    ) -> Result<String, CoordinationError> {
        let outcome = self.consume(&self.challenges, tenant_id, challenge_id).await?;
        grant_payload(outcome, "challenge", tenant_id)
    }

    /// Store an OAuth authorization code. `shard_key` is usually the client id.
    pub async fn issue_authorization_code(
        &self,
        tenant_id: &str,
        shard_key: &str,
        payload: &str,
    ) -> Result<IssuedRecord, CoordinationError> {
        let ttl = self.settings.authorization_code_ttl_secs;
        self.issue(&self.authorization_codes, tenant_id, shard_key, payload, ttl)
            .await
    }

    /// Redeem an authorization code for its payload.
    ///
    /// A code that was already redeemed, has expired or never existed is an
    /// `InvalidGrant`.
    pub async fn redeem_authorization_code(
        &self,
        tenant_id: &str,
        code: &str,
    ) -> Result<String, CoordinationError> {
        let outcome = self.consume(&self.authorization_codes, tenant_id, code).await?;
        grant_payload(outcome, "authorization code", tenant_id)
    }

    async fn issue(
        &self,
        host: &ActorHost<SingleUseActor>,
        tenant_id: &str,
        shard_key: &str,
        payload: &str,
        ttl_secs: u64,
    ) -> Result<IssuedRecord, CoordinationError> {
        let routed = self
            .router
            .route_for_new(tenant_id, shard_key, host.kind())
            .await?;
        let id = routed.encoded_id();

        let reply = host
            .call(
                &routed.handle,
                SingleUseMessage::Issue {
                    record_id: id.clone(),
                    payload: payload.to_string(),
                    ttl_secs,
                },
            )
            .await?;

        match reply {
            SingleUseReply::Issued(true) => {
                tracing::debug!("Issued {} {} on {}", host.kind(), id, routed.handle.instance_name);
                Ok(IssuedRecord {
                    id,
                    expires_in_secs: ttl_secs,
                })
            }
            SingleUseReply::Issued(false) => Err(CoordinationError::Coordination(format!(
                "{} id collision: {id}",
                host.kind()
            ))
            .log()),
            other => Err(unexpected_reply("issue", other)),
        }
    }

    async fn consume(
        &self,
        host: &ActorHost<SingleUseActor>,
        tenant_id: &str,
        record_id: &str,
    ) -> Result<ConsumeOutcome, CoordinationError> {
        let (handle, _) = self
            .router
            .route_existing(tenant_id, host.kind(), record_id)?;

        // Consumption is a mutation: an unanswered call is never retried
        match host
            .call(
                &handle,
                SingleUseMessage::Consume {
                    record_id: record_id.to_string(),
                },
            )
            .await?
        {
            SingleUseReply::Consumed(outcome) => Ok(outcome),
            other => Err(unexpected_reply("consume", other)),
        }
    }
}
