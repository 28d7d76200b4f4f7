//! Shared setup for unit tests across the crate

use std::sync::{Arc, Mutex, Once};

use chrono::{DateTime, TimeDelta, Utc};

use crate::actor::Clock;
use crate::config::RoutingSettings;
use crate::coordination::ShardCoordinator;
use crate::shard::{InMemoryConfigStore, RegionShardResolver};
use crate::storage::{CacheAsideStore, DurableStore, InMemoryCacheStore, KvStore, open_data_store};

/// Load `.env_test` (falling back to `.env`) once per test binary.
pub fn init_test_environment() {
    static ENV_INIT: Once = Once::new();
    ENV_INIT.call_once(|| {
        if dotenvy::from_filename(".env_test").is_err() {
            dotenvy::dotenv().ok();
        }
    });
}

/// A clock that only moves when told to.
#[derive(Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Utc::now())),
        }
    }

    pub fn clock(&self) -> Clock {
        let now = self.now.clone();
        Arc::new(move || *now.lock().unwrap())
    }

    pub fn advance_secs(&self, secs: i64) {
        let mut now = self.now.lock().unwrap();
        *now += TimeDelta::seconds(secs);
    }
}

/// Cache-aside store over the in-memory cache and an in-memory SQLite table.
pub async fn memory_entities() -> CacheAsideStore {
    let data_store = open_data_store("sqlite", "sqlite::memory:").unwrap();
    let durable = KvStore::new(data_store, "test_kv_entries").unwrap();
    durable.init().await.unwrap();
    CacheAsideStore::new(Arc::new(InMemoryCacheStore::new()), Arc::new(durable), 300)
}

/// Coordinator with default settings, no per-tenant documents and a manual clock.
pub async fn test_coordinator() -> (ShardCoordinator, ManualClock) {
    test_coordinator_with(RoutingSettings::default()).await
}

pub async fn test_coordinator_with(settings: RoutingSettings) -> (ShardCoordinator, ManualClock) {
    init_test_environment();

    let resolver = RegionShardResolver::new(
        Arc::new(InMemoryConfigStore::new()),
        settings.resolver_settings(),
    );
    let clock = ManualClock::new();
    let coordinator = ShardCoordinator::with_clock(
        Arc::new(resolver),
        memory_entities().await,
        settings,
        clock.clock(),
    );
    (coordinator, clock)
}
