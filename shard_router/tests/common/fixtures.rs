use std::sync::{Arc, Mutex, Once};

use chrono::{DateTime, TimeDelta, Utc};
use shard_router::{
    CacheAsideStore, Clock, DurableStore, InMemoryCacheStore, InMemoryConfigStore,
    KvStore, RegionShardResolver, RoutingSettings, ShardCoordinator, open_data_store,
};

pub const TENANT: &str = "acme";
pub const OTHER_TENANT: &str = "globex";

/// Two regions, four shards each, generation 1.
pub const TWO_REGION_CONFIG: &str =
    r#"{"generation": 1, "regions": [{"region": "apac", "shards": 4}, {"region": "weur", "shards": 4}]}"#;

/// The same tenant after a reshard to three regions.
pub const THREE_REGION_CONFIG: &str = r#"{"generation": 2, "regions": [{"region": "enam", "shards": 2}, {"region": "apac", "shards": 2}, {"region": "weur", "shards": 2}]}"#;

pub fn init_test_environment() {
    static ENV_INIT: Once = Once::new();
    ENV_INIT.call_once(|| {
        if dotenvy::from_filename(".env_test").is_err() {
            dotenvy::dotenv().ok();
        }
    });
}

/// Time source the tests move by hand.
#[derive(Clone)]
pub struct TestClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl TestClock {
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
        *self.now.lock().unwrap() += TimeDelta::seconds(secs);
    }
}

/// A coordinator wired to in-memory backends.
pub struct TestPlatform {
    pub coordinator: ShardCoordinator,
    pub config_store: Arc<InMemoryConfigStore>,
    pub clock: TestClock,
}

impl TestPlatform {
    pub async fn start() -> Self {
        Self::with_settings(RoutingSettings::default()).await
    }

    pub async fn with_settings(settings: RoutingSettings) -> Self {
        init_test_environment();

        let data_store = open_data_store("sqlite", "sqlite::memory:").unwrap();
        let durable = KvStore::new(data_store, "it_kv_entries").unwrap();
        durable.init().await.unwrap();
        let entities = CacheAsideStore::new(Arc::new(InMemoryCacheStore::new()), Arc::new(durable), 300);

        Self::with_entities(settings, entities)
    }

    pub fn with_entities(settings: RoutingSettings, entities: CacheAsideStore) -> Self {
        let config_store = Arc::new(InMemoryConfigStore::new());
        let resolver = RegionShardResolver::new(config_store.clone(), settings.resolver_settings());
        let clock = TestClock::new();
        let coordinator =
            ShardCoordinator::with_clock(Arc::new(resolver), entities, settings, clock.clock());

        Self {
            coordinator,
            config_store,
            clock,
        }
    }

    /// Publish a region shard document for `tenant_id` and drop the cached one.
    pub async fn publish_config(&self, tenant_id: &str, document: &str) {
        self.config_store.set(tenant_id, document).await;
        self.coordinator
            .router()
            .resolver()
            .invalidate(tenant_id)
            .await;
    }
}
