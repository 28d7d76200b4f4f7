//! Refresh-token families
//!
//! A refresh token on the wire is `{family_id}.{token_id}`. The family id is a
//! composite id, so every rotation of a family lands on the instance that
//! created it. The token id is the rotating secret.

use super::coordinator::{ShardCoordinator, call_idempotent, unexpected_reply};
use super::errors::CoordinationError;
use crate::actors::{RefreshMessage, RefreshReply};
use crate::guard::{FamilyStatus, RotationOutcome};
use crate::router::{ActorKind, RoutingError};
use crate::utils::{TOKEN_ID_BYTES, gen_random_string, is_token_id};

const TOKEN_SEPARATOR: char = '.';

fn join_token(family_id: &str, token_id: &str) -> String {
    format!("{family_id}{TOKEN_SEPARATOR}{token_id}")
}

fn split_token(token: &str) -> Result<(&str, &str), RoutingError> {
    let (family_id, token_id) = token
        .rsplit_once(TOKEN_SEPARATOR)
        .ok_or_else(|| RoutingError::InvalidKeyFormat("refresh token has no family".to_string()))?;
    if !is_token_id(token_id) {
        return Err(RoutingError::InvalidKeyFormat(
            "refresh token id is malformed".to_string(),
        ));
    }
    Ok((family_id, token_id))
}

impl ShardCoordinator {
    /// Open a new family and return its first refresh token.
    pub async fn start_refresh_family(
        &self,
        tenant_id: &str,
        shard_key: &str,
    ) -> Result<String, CoordinationError> {
        let routed = self
            .router
            .route_for_new(tenant_id, shard_key, ActorKind::RefreshToken)
            .await?;
        let family_id = routed.encoded_id();
        let token_id = gen_random_string(TOKEN_ID_BYTES)?;

        match self
            .refresh_tokens
            .call(
                &routed.handle,
                RefreshMessage::Start {
                    family_id: family_id.clone(),
                    token_id: token_id.clone(),
                },
            )
            .await?
        {
            RefreshReply::Started(true) => {
                tracing::debug!("Started refresh family {} for tenant {}", family_id, tenant_id);
                Ok(join_token(&family_id, &token_id))
            }
            RefreshReply::Started(false) => Err(CoordinationError::Coordination(format!(
                "refresh family collision: {family_id}"
            ))
            .log()),
            other => Err(unexpected_reply("start_refresh_family", other)),
        }
    }

    /// Exchange `presented` for the next token of its family.
    ///
    /// Presenting a token that was already rotated away revokes the family and
    /// returns [`CoordinationError::ReuseDetected`]. The caller should then end
    /// every session derived from it.
    pub async fn rotate_refresh_token(
        &self,
        tenant_id: &str,
        presented: &str,
    ) -> Result<String, CoordinationError> {
        let (family_id, token_id) = split_token(presented)?;
        let (handle, _) =
            self.router
                .route_existing(tenant_id, ActorKind::RefreshToken, family_id)?;
        let next = gen_random_string(TOKEN_ID_BYTES)?;

        let reply = self
            .refresh_tokens
            .call(
                &handle,
                RefreshMessage::Rotate {
                    family_id: family_id.to_string(),
                    presented: token_id.to_string(),
                    next,
                },
            )
            .await?;

        match reply {
            RefreshReply::Rotated(RotationOutcome::Rotated { token_id }) => {
                Ok(join_token(family_id, &token_id))
            }
            RefreshReply::Rotated(RotationOutcome::ReuseDetected) => {
                tracing::warn!(
                    security_event = true,
                    tenant_id,
                    family_id,
                    "Refresh token reuse detected, family revoked"
                );
                Err(CoordinationError::ReuseDetected)
            }
            RefreshReply::Rotated(RotationOutcome::InvalidToken) => Err(
                CoordinationError::InvalidGrant("unknown refresh token".to_string()),
            ),
            RefreshReply::Rotated(RotationOutcome::FamilyRevoked) => Err(
                CoordinationError::InvalidGrant("refresh token revoked".to_string()),
            ),
            other => Err(unexpected_reply("rotate_refresh_token", other)),
        }
    }

    /// Revoke the family of `token`, e.g. on logout. Any token of the family,
    /// current or not, identifies it. Returns whether a family was found.
    pub async fn revoke_refresh_family(
        &self,
        tenant_id: &str,
        token: &str,
    ) -> Result<bool, CoordinationError> {
        let (family_id, _) = split_token(token)?;
        let (handle, _) =
            self.router
                .route_existing(tenant_id, ActorKind::RefreshToken, family_id)?;

        match self
            .refresh_tokens
            .call(
                &handle,
                RefreshMessage::Revoke {
                    family_id: family_id.to_string(),
                },
            )
            .await?
        {
            RefreshReply::Revoked(found) => {
                tracing::info!("Revoked refresh family {} (found: {})", family_id, found);
                Ok(found)
            }
            other => Err(unexpected_reply("revoke_refresh_family", other)),
        }
    }

    pub async fn refresh_family_status(
        &self,
        tenant_id: &str,
        token: &str,
    ) -> Result<Option<FamilyStatus>, CoordinationError> {
        let (family_id, _) = split_token(token)?;
        let (handle, _) =
            self.router
                .route_existing(tenant_id, ActorKind::RefreshToken, family_id)?;

        match call_idempotent(&self.refresh_tokens, &handle, || RefreshMessage::Status {
            family_id: family_id.to_string(),
        })
        .await?
        {
            RefreshReply::Status(status) => Ok(status),
            other => Err(unexpected_reply("refresh_family_status", other)),
        }
    }
}
