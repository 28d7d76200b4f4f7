//! Per-tenant region shard configuration
//!
//! Maps global shard indices to regions. Documents are fetched lazily from the
//! configuration store under `region_shard_config:{tenantId}` and cached in
//! process for a short TTL. Resolution is an explicit ordered chain and every
//! result carries the [`ConfigSource`] it came from.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use super::errors::ShardError;
use super::region::RegionKey;

const CONFIG_KEY_PREFIX: &str = "region_shard_config";

fn default_generation() -> u32 {
    1
}

/// Configuration store key for a tenant's document.
pub fn config_key(tenant_id: &str) -> String {
    format!("{CONFIG_KEY_PREFIX}:{tenant_id}")
}

/// Shard count assigned to one region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegionShards {
    pub region: RegionKey,
    pub shards: u32,
}

/// The JSON document stored per tenant.
///
/// ```json
/// {"generation": 1, "regions": [{"region": "apac", "shards": 4}, {"region": "weur", "shards": 4}]}
/// ```
///
/// `generation` defaults to 1. Unknown fields are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegionShardDocument {
    #[serde(default = "default_generation")]
    pub generation: u32,
    pub regions: Vec<RegionShards>,
}

impl RegionShardDocument {
    /// Parse and validate a document. Any invalid entry rejects the whole document.
    pub fn parse(json: &str) -> Result<Self, ShardError> {
        let document: RegionShardDocument = serde_json::from_str(json)?;
        document.validate()?;
        Ok(document)
    }

    fn validate(&self) -> Result<(), ShardError> {
        if self.regions.is_empty() {
            return Err(ShardError::InvalidConfig(
                "at least one region is required".to_string(),
            ));
        }

        if let Some(entry) = self.regions.iter().find(|entry| entry.shards == 0) {
            return Err(ShardError::InvalidConfig(format!(
                "region {} has zero shards",
                entry.region
            )));
        }

        self.regions
            .iter()
            .try_fold(0u32, |total, entry| total.checked_add(entry.shards))
            .ok_or_else(|| ShardError::InvalidConfig("total shard count overflows".to_string()))?;

        Ok(())
    }
}

/// Where a resolved configuration came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigSource {
    /// Tenant document from the configuration store
    Dynamic,
    /// Environment-level document shared by all tenants
    Environment,
    /// Single-region static default
    StaticDefault,
    /// Previously cached value served because a refresh failed
    StaleCache,
}

/// Resolved shard layout for one tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionShardConfig {
    pub generation: u32,
    pub regions: Vec<RegionShards>,
    pub source: ConfigSource,
}

impl RegionShardConfig {
    pub(crate) fn from_document(document: RegionShardDocument, source: ConfigSource) -> Self {
        Self {
            generation: document.generation,
            regions: document.regions,
            source,
        }
    }

    /// One region holding every shard.
    pub fn static_default(region: RegionKey, shards: u32) -> Self {
        Self {
            generation: default_generation(),
            regions: vec![RegionShards {
                region,
                shards: shards.max(1),
            }],
            source: ConfigSource::StaticDefault,
        }
    }

    /// Size of the global shard space.
    pub fn total_shards(&self) -> u32 {
        self.regions.iter().map(|entry| entry.shards).sum()
    }

    /// Region owning a global shard index.
    ///
    /// Indices are assigned to regions contiguously in declaration order. A
    /// configured region that cannot host actors is replaced by its nearest
    /// capable region.
    pub fn shard_index_to_region(&self, shard_index: u32) -> Result<RegionKey, ShardError> {
        let mut upper = 0u32;
        for entry in &self.regions {
            upper += entry.shards;
            if shard_index < upper {
                if !entry.region.is_capable() {
                    tracing::debug!(
                        "Region {} cannot host actors, substituting {}",
                        entry.region,
                        entry.region.nearest_capable()
                    );
                }
                return Ok(entry.region.nearest_capable());
            }
        }

        Err(ShardError::ShardOutOfRange {
            index: shard_index,
            total: upper,
        })
    }
}

/// Source of per-tenant documents.
#[async_trait]
pub trait ConfigStore: Send + Sync + 'static {
    /// Raw document for a tenant, `None` when the tenant has none.
    async fn fetch(&self, tenant_id: &str) -> Result<Option<String>, ShardError>;
}

/// Process-local configuration store, used for development and tests.
#[derive(Default)]
pub struct InMemoryConfigStore {
    documents: RwLock<HashMap<String, String>>,
}

impl InMemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set(&self, tenant_id: &str, document: impl Into<String>) {
        self.documents
            .write()
            .await
            .insert(config_key(tenant_id), document.into());
    }

    pub async fn remove(&self, tenant_id: &str) {
        self.documents.write().await.remove(&config_key(tenant_id));
    }
}

#[async_trait]
impl ConfigStore for InMemoryConfigStore {
    async fn fetch(&self, tenant_id: &str) -> Result<Option<String>, ShardError> {
        Ok(self.documents.read().await.get(&config_key(tenant_id)).cloned())
    }
}

/// Configuration store backed by a Redis key space.
pub struct RedisConfigStore {
    client: redis::Client,
}

impl RedisConfigStore {
    pub fn open(url: &str) -> Result<Self, ShardError> {
        Ok(Self {
            client: redis::Client::open(url)?,
        })
    }
}

#[async_trait]
impl ConfigStore for RedisConfigStore {
    async fn fetch(&self, tenant_id: &str) -> Result<Option<String>, ShardError> {
        use redis::AsyncCommands;

        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let value: Option<String> = conn.get(config_key(tenant_id)).await?;
        Ok(value)
    }
}

/// Knobs for [`RegionShardResolver`].
#[derive(Debug, Clone)]
pub struct ResolverSettings {
    /// How long a resolved configuration is served without refetching
    pub cache_ttl: Duration,
    /// Region of the static default
    pub default_region: RegionKey,
    /// Shard count of the static default
    pub default_shard_count: u32,
    /// Environment-level document used when a tenant has none
    pub environment_document: Option<RegionShardDocument>,
    /// Serve the static default when a fetch fails and nothing is cached
    pub fallback_on_fetch_error: bool,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(10),
            default_region: RegionKey::Weur,
            default_shard_count: 4,
            environment_document: None,
            fallback_on_fetch_error: true,
        }
    }
}

struct CachedConfig {
    config: RegionShardConfig,
    fetched_at: Instant,
}

/// Resolves and caches tenant configurations. Never writes to the store.
pub struct RegionShardResolver {
    store: Arc<dyn ConfigStore>,
    settings: ResolverSettings,
    cache: RwLock<HashMap<String, CachedConfig>>,
}

impl RegionShardResolver {
    pub fn new(store: Arc<dyn ConfigStore>, settings: ResolverSettings) -> Self {
        Self {
            store,
            settings,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn settings(&self) -> &ResolverSettings {
        &self.settings
    }

    /// Resolve a tenant's configuration.
    ///
    /// Order: fresh cache entry, tenant document, environment document, static
    /// default. When the store fails the last cached value is served, then the
    /// static default if `fallback_on_fetch_error` is set.
    pub async fn resolve(&self, tenant_id: &str) -> Result<RegionShardConfig, ShardError> {
        if let Some(config) = self.cached(tenant_id, false).await {
            return Ok(config);
        }

        match self.fetch_document(tenant_id).await {
            Ok(config) => {
                tracing::debug!(
                    "Resolved region shard config for tenant {}: generation={}, source={:?}",
                    tenant_id,
                    config.generation,
                    config.source
                );
                self.cache.write().await.insert(
                    tenant_id.to_string(),
                    CachedConfig {
                        config: config.clone(),
                        fetched_at: Instant::now(),
                    },
                );
                Ok(config)
            }
            Err(e) => {
                if let Some(mut stale) = self.cached(tenant_id, true).await {
                    tracing::warn!(
                        "Config fetch for tenant {} failed, serving cached value: {}",
                        tenant_id,
                        e
                    );
                    stale.source = ConfigSource::StaleCache;
                    return Ok(stale);
                }

                if self.settings.fallback_on_fetch_error {
                    tracing::warn!(
                        "Config fetch for tenant {} failed with nothing cached, using static default: {}",
                        tenant_id,
                        e
                    );
                    return Ok(self.static_default());
                }

                tracing::error!("Config fetch for tenant {} failed: {}", tenant_id, e);
                Err(ShardError::Unavailable(tenant_id.to_string()))
            }
        }
    }

    /// Drop a tenant's cached configuration so the next resolve refetches.
    pub async fn invalidate(&self, tenant_id: &str) {
        self.cache.write().await.remove(tenant_id);
    }

    async fn cached(&self, tenant_id: &str, allow_expired: bool) -> Option<RegionShardConfig> {
        let cache = self.cache.read().await;
        let entry = cache.get(tenant_id)?;
        if allow_expired || entry.fetched_at.elapsed() < self.settings.cache_ttl {
            Some(entry.config.clone())
        } else {
            None
        }
    }

    async fn fetch_document(&self, tenant_id: &str) -> Result<RegionShardConfig, ShardError> {
        match self.store.fetch(tenant_id).await? {
            Some(raw) => {
                let document = RegionShardDocument::parse(&raw)?;
                Ok(RegionShardConfig::from_document(
                    document,
                    ConfigSource::Dynamic,
                ))
            }
            None => Ok(match &self.settings.environment_document {
                Some(document) => {
                    RegionShardConfig::from_document(document.clone(), ConfigSource::Environment)
                }
                None => self.static_default(),
            }),
        }
    }

    fn static_default(&self) -> RegionShardConfig {
        RegionShardConfig::static_default(
            self.settings.default_region,
            self.settings.default_shard_count,
        )
    }
}
