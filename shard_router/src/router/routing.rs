use std::sync::Arc;

use super::errors::RoutingError;
use super::handle::{ActorHandle, ActorKind};
use crate::id::{CompositeId, RecordId};
use crate::shard::{RegionShardResolver, ShardKeyStrategy};

/// A freshly placed record: where it lives and the id that will find it again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutedRecord {
    pub handle: ActorHandle,
    pub id: CompositeId,
}

impl RoutedRecord {
    pub fn encoded_id(&self) -> String {
        self.id.encode()
    }
}

/// Maps tenants, shard keys and record ids to actor handles.
///
/// Routing a new record consults the tenant's current configuration. Routing an
/// existing record never does: everything needed is inside its id, so records
/// minted under an older generation stay reachable after a reshard.
pub struct ActorRouter {
    resolver: Arc<RegionShardResolver>,
}

impl ActorRouter {
    pub fn new(resolver: Arc<RegionShardResolver>) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &Arc<RegionShardResolver> {
        &self.resolver
    }

    /// Place a new record of `kind` using the current strategy.
    pub async fn route_for_new(
        &self,
        tenant_id: &str,
        shard_key: &str,
        kind: ActorKind,
    ) -> Result<RoutedRecord, RoutingError> {
        self.route_for_new_with(tenant_id, shard_key, kind, ShardKeyStrategy::default())
            .await
    }

    /// Place a new record with an explicit shard key strategy.
    pub async fn route_for_new_with(
        &self,
        tenant_id: &str,
        shard_key: &str,
        kind: ActorKind,
        strategy: ShardKeyStrategy,
    ) -> Result<RoutedRecord, RoutingError> {
        validate_tenant_id(tenant_id)?;

        let config = self.resolver.resolve(tenant_id).await?;
        let shard_index = strategy.shard_index(shard_key, config.total_shards());
        let region = config.shard_index_to_region(shard_index)?;
        let id = CompositeId::new(config.generation, region, shard_index, kind.type_prefix())?;

        tracing::debug!(
            "Routed new {} record for tenant {} to shard {} in {} (generation {}, {:?})",
            kind,
            tenant_id,
            shard_index,
            region,
            config.generation,
            config.source
        );

        Ok(RoutedRecord {
            handle: ActorHandle::sharded(kind, tenant_id, region, shard_index),
            id,
        })
    }

    /// Locate the actor owning an existing record.
    ///
    /// Composite ids are routed purely from their embedded region and shard.
    /// Legacy bare uuids go to the tenant's default instance. A composite id
    /// minted for another kind is rejected.
    pub fn route_existing(
        &self,
        tenant_id: &str,
        kind: ActorKind,
        record_id: &str,
    ) -> Result<(ActorHandle, RecordId), RoutingError> {
        validate_tenant_id(tenant_id)?;

        let record = RecordId::parse(record_id)?;
        let handle = match &record {
            RecordId::Composite(id) => {
                if id.type_prefix != kind.type_prefix() {
                    return Err(RoutingError::InvalidKeyFormat(format!(
                        "{} id presented as {}",
                        id.type_prefix, kind
                    )));
                }
                ActorHandle::sharded(kind, tenant_id, id.region, id.shard_index)
            }
            RecordId::Legacy(_) => {
                tracing::debug!("Routing legacy {} id to default instance", kind);
                ActorHandle::legacy_default(kind, tenant_id)
            }
        };

        Ok((handle, record))
    }

    /// Locate the actor for a key-addressed record (e.g. a rate limit
    /// identifier) that never gets a composite id.
    pub async fn route_key(
        &self,
        tenant_id: &str,
        shard_key: &str,
        kind: ActorKind,
    ) -> Result<ActorHandle, RoutingError> {
        validate_tenant_id(tenant_id)?;

        let config = self.resolver.resolve(tenant_id).await?;
        let shard_index = crate::shard::shard_index(shard_key, config.total_shards());
        let region = config.shard_index_to_region(shard_index)?;
        Ok(ActorHandle::sharded(kind, tenant_id, region, shard_index))
    }
}

/// Tenant ids become part of instance names, so they may not contain the
/// segment separator.
pub(crate) fn validate_tenant_id(tenant_id: &str) -> Result<(), RoutingError> {
    if tenant_id.is_empty() {
        return Err(RoutingError::InvalidKeyFormat(
            "tenant id is empty".to_string(),
        ));
    }
    if tenant_id
        .chars()
        .any(|c| c == ':' || c.is_whitespace() || c.is_control())
    {
        return Err(RoutingError::InvalidKeyFormat(format!(
            "tenant id {tenant_id:?} contains reserved characters"
        )));
    }
    Ok(())
}
