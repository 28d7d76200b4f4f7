//! Prefix-routed entity access
//!
//! Logical keys starting with a known actor prefix belong to that actor. Of
//! those only sessions can be read and written as plain values; the other
//! actor kinds have their own operations. Everything else lives in the
//! cache-aside store under a tenant-scoped key.

use std::time::Duration;

use super::coordinator::ShardCoordinator;
use super::errors::CoordinationError;
use crate::router::{ActorKind, RouteTarget, RoutingError, validate_tenant_id};

enum EntityRoute<'a> {
    Session(&'a str),
    Stored(String),
}

fn route_entity<'a>(tenant_id: &str, key: &'a str) -> Result<EntityRoute<'a>, RoutingError> {
    validate_tenant_id(tenant_id)?;
    match RouteTarget::classify(key) {
        RouteTarget::Actor {
            kind: ActorKind::Session,
            record_key,
        } => Ok(EntityRoute::Session(record_key)),
        RouteTarget::Actor { kind, .. } => Err(RoutingError::InvalidKeyFormat(format!(
            "{kind} records are not plain entities"
        ))),
        RouteTarget::CacheAside { key } if key.is_empty() => {
            Err(RoutingError::InvalidKeyFormat("entity key is empty".to_string()))
        }
        RouteTarget::CacheAside { key } => Ok(EntityRoute::Stored(format!("{tenant_id}:{key}"))),
    }
}

impl ShardCoordinator {
    pub async fn get_entity(
        &self,
        tenant_id: &str,
        key: &str,
    ) -> Result<Option<String>, CoordinationError> {
        match route_entity(tenant_id, key)? {
            EntityRoute::Session(session_id) => self.get_session(tenant_id, session_id).await,
            EntityRoute::Stored(scoped) => Ok(self.entities.get(&scoped).await?),
        }
    }

    /// Write an entity. `ttl` is ignored for sessions, which always use the
    /// configured session lifetime. Session keys only update live sessions.
    pub async fn put_entity(
        &self,
        tenant_id: &str,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), CoordinationError> {
        match route_entity(tenant_id, key)? {
            EntityRoute::Session(session_id) => {
                if self.update_session(tenant_id, session_id, value).await? {
                    Ok(())
                } else {
                    Err(CoordinationError::InvalidGrant("unknown session".to_string()).log())
                }
            }
            EntityRoute::Stored(scoped) => Ok(self.entities.set(&scoped, value, ttl).await?),
        }
    }

    pub async fn delete_entity(&self, tenant_id: &str, key: &str) -> Result<bool, CoordinationError> {
        match route_entity(tenant_id, key)? {
            EntityRoute::Session(session_id) => self.delete_session(tenant_id, session_id).await,
            EntityRoute::Stored(scoped) => Ok(self.entities.delete(&scoped).await?),
        }
    }
}
