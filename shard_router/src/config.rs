//! Central configuration for the shard_router crate
//!
//! Every knob is read once from the environment into [`RoutingSettings`]. Unset
//! or unparsable variables fall back to the documented defaults; an invalid value
//! is logged, never fatal.

use std::str::FromStr;
use std::sync::LazyLock;
use std::time::Duration;

use crate::guard::ThrottleConfig;
use crate::shard::{RegionKey, RegionShardDocument, ResolverSettings};

/// Process-wide settings, loaded from the environment on first use.
pub static ROUTING_SETTINGS: LazyLock<RoutingSettings> = LazyLock::new(RoutingSettings::from_env);

/// Typed routing configuration.
#[derive(Debug, Clone)]
pub struct RoutingSettings {
    /// `ROUTING_DEFAULT_REGION` (default `weur`)
    pub default_region: RegionKey,
    /// `ROUTING_DEFAULT_SHARD_COUNT` (default 4)
    pub default_shard_count: u32,
    /// `ROUTING_REGION_SHARD_CONFIG`, an environment-level document applied to
    /// tenants without their own
    pub environment_document: Option<RegionShardDocument>,
    /// `ROUTING_CONFIG_CACHE_TTL_SECS` (default 10)
    pub config_cache_ttl: Duration,
    /// `ROUTING_FALLBACK_ON_FETCH_ERROR` (default true)
    pub fallback_on_fetch_error: bool,
    /// `ROUTING_CONFIG_STORE_URL`, Redis holding per-tenant documents; unset
    /// means no per-tenant documents
    pub config_store_url: Option<String>,
    /// `ROUTING_ACTOR_CALL_TIMEOUT_MS` (default 5000)
    pub actor_call_timeout: Duration,
    /// `ROUTING_ACTOR_MAILBOX_SIZE` (default 256)
    pub actor_mailbox_size: usize,
    /// `CHALLENGE_TTL_SECS` (default 300)
    pub challenge_ttl_secs: u64,
    /// `AUTHORIZATION_CODE_TTL_SECS` (default 60)
    pub authorization_code_ttl_secs: u64,
    /// `SESSION_TTL_SECS` (default 3600)
    pub session_ttl_secs: u64,
    /// `REFRESH_FAMILY_IDLE_SECS` (default 30 days)
    pub refresh_family_idle_secs: u64,
    /// `RATE_LIMIT_MAX_ATTEMPTS`, `RATE_LIMIT_WINDOW_SECS`, `RATE_LIMIT_BLOCK_SECS`
    pub rate_limit: ThrottleConfig,
    /// `RATE_LIMIT_CLEANUP_INTERVAL_SECS` (default 300); also drives the other
    /// actors' expiry sweeps and the purge of expired durable entities
    pub cleanup_interval: Duration,
}

impl Default for RoutingSettings {
    fn default() -> Self {
        Self {
            default_region: RegionKey::Weur,
            default_shard_count: 4,
            environment_document: None,
            config_cache_ttl: Duration::from_secs(10),
            fallback_on_fetch_error: true,
            config_store_url: None,
            actor_call_timeout: Duration::from_millis(5000),
            actor_mailbox_size: 256,
            challenge_ttl_secs: 300,
            authorization_code_ttl_secs: 60,
            session_ttl_secs: 3600,
            refresh_family_idle_secs: 30 * 24 * 60 * 60,
            rate_limit: ThrottleConfig::default(),
            cleanup_interval: Duration::from_secs(300),
        }
    }
}

impl RoutingSettings {
    /// Read settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary lookup, used by `from_env` and tests.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let environment_document =
            lookup("ROUTING_REGION_SHARD_CONFIG").and_then(|raw| {
                match RegionShardDocument::parse(&raw) {
                    Ok(document) => Some(document),
                    Err(e) => {
                        tracing::warn!("Ignoring ROUTING_REGION_SHARD_CONFIG: {}", e);
                        None
                    }
                }
            });

        let default_shard_count = match parse_or(
            &lookup,
            "ROUTING_DEFAULT_SHARD_COUNT",
            defaults.default_shard_count,
        ) {
            0 => {
                tracing::warn!("ROUTING_DEFAULT_SHARD_COUNT must be positive, using default");
                defaults.default_shard_count
            }
            count => count,
        };

        let max_attempts = match parse_or(
            &lookup,
            "RATE_LIMIT_MAX_ATTEMPTS",
            defaults.rate_limit.max_attempts,
        ) {
            0 => {
                tracing::warn!("RATE_LIMIT_MAX_ATTEMPTS must be positive, using default");
                defaults.rate_limit.max_attempts
            }
            attempts => attempts,
        };

        Self {
            default_region: parse_or(&lookup, "ROUTING_DEFAULT_REGION", defaults.default_region),
            default_shard_count,
            environment_document,
            config_cache_ttl: secs_or(
                &lookup,
                "ROUTING_CONFIG_CACHE_TTL_SECS",
                defaults.config_cache_ttl,
            ),
            fallback_on_fetch_error: parse_or(
                &lookup,
                "ROUTING_FALLBACK_ON_FETCH_ERROR",
                defaults.fallback_on_fetch_error,
            ),
            config_store_url: lookup("ROUTING_CONFIG_STORE_URL")
                .filter(|url| !url.trim().is_empty()),
            actor_call_timeout: lookup("ROUTING_ACTOR_CALL_TIMEOUT_MS")
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.actor_call_timeout),
            actor_mailbox_size: parse_or(
                &lookup,
                "ROUTING_ACTOR_MAILBOX_SIZE",
                defaults.actor_mailbox_size,
            )
            .max(1),
            challenge_ttl_secs: parse_or(&lookup, "CHALLENGE_TTL_SECS", defaults.challenge_ttl_secs),
            authorization_code_ttl_secs: parse_or(
                &lookup,
                "AUTHORIZATION_CODE_TTL_SECS",
                defaults.authorization_code_ttl_secs,
            ),
            session_ttl_secs: parse_or(&lookup, "SESSION_TTL_SECS", defaults.session_ttl_secs),
            refresh_family_idle_secs: parse_or(
                &lookup,
                "REFRESH_FAMILY_IDLE_SECS",
                defaults.refresh_family_idle_secs,
            ),
            rate_limit: ThrottleConfig {
                max_attempts,
                window: secs_or(&lookup, "RATE_LIMIT_WINDOW_SECS", defaults.rate_limit.window),
                block_duration: secs_or(
                    &lookup,
                    "RATE_LIMIT_BLOCK_SECS",
                    defaults.rate_limit.block_duration,
                ),
            },
            cleanup_interval: secs_or(
                &lookup,
                "RATE_LIMIT_CLEANUP_INTERVAL_SECS",
                defaults.cleanup_interval,
            ),
        }
    }

    /// Settings for the region shard resolver.
    pub fn resolver_settings(&self) -> ResolverSettings {
        ResolverSettings {
            cache_ttl: self.config_cache_ttl,
            default_region: self.default_region,
            default_shard_count: self.default_shard_count,
            environment_document: self.environment_document.clone(),
            fallback_on_fetch_error: self.fallback_on_fetch_error,
        }
    }
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid value for {}: {:?}, using default", key, raw);
            default
        }),
        None => default,
    }
}

fn secs_or(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: Duration) -> Duration {
    lookup(key)
        .and_then(|raw| raw.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}
