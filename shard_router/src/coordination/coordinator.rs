use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::errors::CoordinationError;
use crate::actor::{Actor, ActorHost, Clock, HostSettings, system_clock};
use crate::actors::{
    RateLimitConfig, RateLimiterActor, RefreshConfig, RefreshTokenActor, SessionActor,
    SessionConfig, SingleUseActor, SingleUseConfig,
};
use crate::config::{ROUTING_SETTINGS, RoutingSettings};
use crate::router::{ActorHandle, ActorKind, ActorRouter, RoutingError};
use crate::shard::{ConfigStore, InMemoryConfigStore, RedisConfigStore, RegionShardResolver};
use crate::storage::{CacheAsideStore, STORAGE_SETTINGS};

/// Entry point for every routed operation.
///
/// Owns the router, one actor host per kind and the cache-aside store for data
/// no actor owns. Expired durable entities are purged in the background every
/// `cleanup_interval` until [`shutdown`](Self::shutdown).
pub struct ShardCoordinator {
    pub(super) router: ActorRouter,
    pub(super) challenges: ActorHost<SingleUseActor>,
    pub(super) authorization_codes: ActorHost<SingleUseActor>,
    pub(super) refresh_tokens: ActorHost<RefreshTokenActor>,
    pub(super) sessions: ActorHost<SessionActor>,
    pub(super) rate_limits: ActorHost<RateLimiterActor>,
    pub(super) entities: Arc<CacheAsideStore>,
    pub(super) settings: RoutingSettings,
    purge_task: Mutex<Option<JoinHandle<()>>>,
}

impl ShardCoordinator {
    pub fn new(
        resolver: Arc<RegionShardResolver>,
        entities: CacheAsideStore,
        settings: RoutingSettings,
    ) -> Self {
        Self::with_clock(resolver, entities, settings, system_clock())
    }

    /// Same as [`new`](Self::new) with an explicit time source for actors.
    pub fn with_clock(
        resolver: Arc<RegionShardResolver>,
        entities: CacheAsideStore,
        settings: RoutingSettings,
        clock: Clock,
    ) -> Self {
        let host_settings = HostSettings {
            call_timeout: settings.actor_call_timeout,
            mailbox_size: settings.actor_mailbox_size,
        };
        let cleanup_interval = settings.cleanup_interval;
        let single_use = || SingleUseConfig { cleanup_interval };
        let entities = Arc::new(entities);
        let purge_task = spawn_entity_purge(entities.clone(), cleanup_interval);

        Self {
            router: ActorRouter::new(resolver),
            challenges: ActorHost::new(
                ActorKind::Challenge,
                single_use(),
                host_settings,
                clock.clone(),
            ),
            authorization_codes: ActorHost::new(
                ActorKind::AuthorizationCode,
                single_use(),
                host_settings,
                clock.clone(),
            ),
            refresh_tokens: ActorHost::new(
                ActorKind::RefreshToken,
                RefreshConfig {
                    idle_timeout: Duration::from_secs(settings.refresh_family_idle_secs),
                    cleanup_interval,
                },
                host_settings,
                clock.clone(),
            ),
            sessions: ActorHost::new(
                ActorKind::Session,
                SessionConfig { cleanup_interval },
                host_settings,
                clock.clone(),
            ),
            rate_limits: ActorHost::new(
                ActorKind::RateLimit,
                RateLimitConfig {
                    throttle: settings.rate_limit,
                    cleanup_interval,
                },
                host_settings,
                clock,
            ),
            entities,
            settings,
            purge_task: Mutex::new(purge_task),
        }
    }

    /// Build a coordinator from the process environment.
    pub async fn from_env() -> Result<Self, CoordinationError> {
        let settings = ROUTING_SETTINGS.clone();

        let config_store: Arc<dyn ConfigStore> = match &settings.config_store_url {
            Some(url) => {
                tracing::info!("Reading tenant shard configuration from Redis");
                Arc::new(RedisConfigStore::open(url).map_err(RoutingError::from)?)
            }
            None => {
                tracing::info!("No tenant config store configured, using environment defaults");
                Arc::new(InMemoryConfigStore::new())
            }
        };
        let resolver = RegionShardResolver::new(config_store, settings.resolver_settings());
        let entities = CacheAsideStore::from_settings(&STORAGE_SETTINGS).await?;

        Ok(Self::new(Arc::new(resolver), entities, settings))
    }

    pub fn router(&self) -> &ActorRouter {
        &self.router
    }

    pub fn settings(&self) -> &RoutingSettings {
        &self.settings
    }

    pub fn entities(&self) -> &CacheAsideStore {
        &self.entities
    }

    /// Stop every actor and the entity purge. State held by actors is lost.
    pub async fn shutdown(&self) {
        self.stop_purge();
        self.challenges.shutdown().await;
        self.authorization_codes.shutdown().await;
        self.refresh_tokens.shutdown().await;
        self.sessions.shutdown().await;
        self.rate_limits.shutdown().await;
    }

    fn stop_purge(&self) {
        let task = match self.purge_task.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(task) = task {
            task.abort();
            tracing::debug!("Stopped entity purge");
        }
    }
}

impl Drop for ShardCoordinator {
    fn drop(&mut self) {
        self.stop_purge();
    }
}

/// Periodically drop expired rows from the durable entity table.
///
/// Returns `None` outside a tokio runtime; nothing is purged then.
fn spawn_entity_purge(
    entities: Arc<CacheAsideStore>,
    interval: Duration,
) -> Option<JoinHandle<()>> {
    if interval.is_zero() {
        return None;
    }
    let runtime = tokio::runtime::Handle::try_current().ok()?;

    Some(runtime.spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            match entities.purge_expired().await {
                Ok(0) => {}
                Ok(purged) => tracing::debug!("Purged {} expired entities", purged),
                Err(e) => tracing::warn!("Failed to purge expired entities: {}", e),
            }
        }
    }))
}

/// Call for a read-only message; an unanswered call is retried once.
pub(super) async fn call_idempotent<A: Actor>(
    host: &ActorHost<A>,
    handle: &ActorHandle,
    message: impl Fn() -> A::Message,
) -> Result<A::Reply, RoutingError> {
    match host.call(handle, message()).await {
        Err(RoutingError::ActorUnavailable(reason)) => {
            tracing::debug!(
                "Retrying read on {} after: {}",
                handle.instance_name,
                reason
            );
            host.call(handle, message()).await
        }
        result => result,
    }
}

pub(super) fn unexpected_reply(operation: &str, reply: impl std::fmt::Debug) -> CoordinationError {
    CoordinationError::Coordination(format!("unexpected reply to {operation}: {reply:?}")).log()
}
