//! Fixed-window attempt throttling
//!
//! Failures are counted per identifier (normally a client IP) inside a fixed
//! window. Once the count reaches `max_attempts` the identifier is blocked for
//! `block_duration`; further failures during the block neither extend nor
//! shorten it. Records are purged by the owning actor's cleanup alarm, never by
//! request traffic.

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

/// Throttling limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleConfig {
    /// Failures within one window that trigger a block
    pub max_attempts: u32,
    /// Length of the counting window
    pub window: Duration,
    /// How long a block lasts
    pub block_duration: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            window: Duration::from_secs(15 * 60),
            block_duration: Duration::from_secs(15 * 60),
        }
    }
}

/// Failure history of one identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord {
    pub count: u32,
    pub window_start: DateTime<Utc>,
    pub blocked_until: Option<DateTime<Utc>>,
}

/// Answer to "may this identifier try again?".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ThrottleStatus {
    pub blocked: bool,
    pub retry_after_seconds: u64,
    pub attempts: u32,
}

impl ThrottleStatus {
    fn open(attempts: u32) -> Self {
        Self {
            blocked: false,
            retry_after_seconds: 0,
            attempts,
        }
    }
}

fn to_delta(duration: Duration) -> TimeDelta {
    TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX)
}

/// Attempt counters owned by one actor instance.
#[derive(Debug)]
pub struct AttemptThrottle {
    config: ThrottleConfig,
    records: HashMap<String, AttemptRecord>,
}

impl AttemptThrottle {
    pub fn new(config: ThrottleConfig) -> Self {
        Self {
            config,
            records: HashMap::new(),
        }
    }

    pub fn config(&self) -> &ThrottleConfig {
        &self.config
    }

    /// Count one failure and return the resulting status.
    pub fn record_failure(&mut self, identifier: &str, now: DateTime<Utc>) -> ThrottleStatus {
        let window = to_delta(self.config.window);
        let block = to_delta(self.config.block_duration);

        let record = self
            .records
            .entry(identifier.to_string())
            .or_insert_with(|| AttemptRecord {
                count: 0,
                window_start: now,
                blocked_until: None,
            });

        match record.blocked_until {
            Some(until) if now < until => {
                return Self::status_of(record, now, window);
            }
            Some(_) => {
                // Block served; start over
                record.count = 0;
                record.window_start = now;
                record.blocked_until = None;
            }
            None if now - record.window_start >= window => {
                record.count = 0;
                record.window_start = now;
            }
            None => {}
        }

        record.count = record.count.saturating_add(1);
        if record.count >= self.config.max_attempts {
            record.blocked_until = Some(now.checked_add_signed(block).unwrap_or(DateTime::<Utc>::MAX_UTC));
            tracing::warn!(
                "Identifier {} blocked after {} failed attempts",
                identifier,
                record.count
            );
        }

        Self::status_of(record, now, window)
    }

    /// Current status without counting anything.
    pub fn is_blocked(&self, identifier: &str, now: DateTime<Utc>) -> ThrottleStatus {
        match self.records.get(identifier) {
            Some(record) => Self::status_of(record, now, to_delta(self.config.window)),
            None => ThrottleStatus::open(0),
        }
    }

    /// Forget an identifier, e.g. after a successful authentication.
    pub fn clear(&mut self, identifier: &str) -> bool {
        self.records.remove(identifier).is_some()
    }

    /// Drop records whose window has elapsed and which are not blocked.
    pub fn purge_expired(&mut self, now: DateTime<Utc>) -> usize {
        let window = to_delta(self.config.window);
        let before = self.records.len();
        self.records.retain(|_, record| match record.blocked_until {
            Some(until) => now < until,
            None => now - record.window_start < window,
        });
        before - self.records.len()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn status_of(record: &AttemptRecord, now: DateTime<Utc>, window: TimeDelta) -> ThrottleStatus {
        match record.blocked_until {
            Some(until) if now < until => {
                let remaining_ms = (until - now).num_milliseconds().max(0) as u64;
                ThrottleStatus {
                    blocked: true,
                    retry_after_seconds: remaining_ms.div_ceil(1000).max(1),
                    attempts: record.count,
                }
            }
            Some(_) => ThrottleStatus::open(0),
            None if now - record.window_start >= window => ThrottleStatus::open(0),
            None => ThrottleStatus::open(record.count),
        }
    }
}
