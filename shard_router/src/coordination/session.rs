use super::coordinator::{ShardCoordinator, call_idempotent, unexpected_reply};
use super::errors::CoordinationError;
use crate::actors::{SessionMessage, SessionReply};
use crate::router::ActorKind;

impl ShardCoordinator {
    /// Create a session for `shard_key` (usually the user id) and return its id.
    pub async fn put_session(
        &self,
        tenant_id: &str,
        shard_key: &str,
        payload: &str,
    ) -> Result<String, CoordinationError> {
        let routed = self
            .router
            .route_for_new(tenant_id, shard_key, ActorKind::Session)
            .await?;
        let session_id = routed.encoded_id();

        match self
            .sessions
            .call(
                &routed.handle,
                SessionMessage::Put {
                    session_id: session_id.clone(),
                    payload: payload.to_string(),
                    ttl_secs: self.settings.session_ttl_secs,
                },
            )
            .await?
        {
            SessionReply::Stored => Ok(session_id),
            other => Err(unexpected_reply("put_session", other)),
        }
    }

    /// Replace the payload of a live session and restart its lifetime.
    ///
    /// Returns `false` when the id was never issued or has expired; no session
    /// is created in that case.
    pub async fn update_session(
        &self,
        tenant_id: &str,
        session_id: &str,
        payload: &str,
    ) -> Result<bool, CoordinationError> {
        let (handle, _) = self
            .router
            .route_existing(tenant_id, ActorKind::Session, session_id)?;

        match self
            .sessions
            .call(
                &handle,
                SessionMessage::Update {
                    session_id: session_id.to_string(),
                    payload: payload.to_string(),
                    ttl_secs: self.settings.session_ttl_secs,
                },
            )
            .await?
        {
            SessionReply::Updated(found) => Ok(found),
            other => Err(unexpected_reply("update_session", other)),
        }
    }

    pub async fn get_session(
        &self,
        tenant_id: &str,
        session_id: &str,
    ) -> Result<Option<String>, CoordinationError> {
        let (handle, _) = self
            .router
            .route_existing(tenant_id, ActorKind::Session, session_id)?;

        match call_idempotent(&self.sessions, &handle, || SessionMessage::Get {
            session_id: session_id.to_string(),
        })
        .await?
        {
            SessionReply::Found(payload) => Ok(payload),
            other => Err(unexpected_reply("get_session", other)),
        }
    }

    pub async fn delete_session(
        &self,
        tenant_id: &str,
        session_id: &str,
    ) -> Result<bool, CoordinationError> {
        let (handle, _) = self
            .router
            .route_existing(tenant_id, ActorKind::Session, session_id)?;

        match self
            .sessions
            .call(
                &handle,
                SessionMessage::Delete {
                    session_id: session_id.to_string(),
                },
            )
            .await?
        {
            SessionReply::Deleted(found) => Ok(found),
            other => Err(unexpected_reply("delete_session", other)),
        }
    }
}
