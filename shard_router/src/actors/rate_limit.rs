use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::actor::Actor;
use crate::guard::{AttemptThrottle, ThrottleConfig, ThrottleStatus};
use crate::router::ActorHandle;

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub throttle: ThrottleConfig,
    pub cleanup_interval: Duration,
}

#[derive(Debug)]
pub enum RateLimitMessage {
    RecordFailure { identifier: String },
    Check { identifier: String },
    Clear { identifier: String },
}

#[derive(Debug, PartialEq, Eq)]
pub enum RateLimitReply {
    Status(ThrottleStatus),
    Cleared(bool),
}

pub struct RateLimiterActor {
    name: String,
    throttle: AttemptThrottle,
    cleanup_interval: Duration,
}

impl Actor for RateLimiterActor {
    type Config = RateLimitConfig;
    type Message = RateLimitMessage;
    type Reply = RateLimitReply;

    fn new(handle: &ActorHandle, config: &RateLimitConfig) -> Self {
        Self {
            name: handle.instance_name.clone(),
            throttle: AttemptThrottle::new(config.throttle),
            cleanup_interval: config.cleanup_interval,
        }
    }

    fn handle(&mut self, message: RateLimitMessage, now: DateTime<Utc>) -> RateLimitReply {
        match message {
            RateLimitMessage::RecordFailure { identifier } => {
                RateLimitReply::Status(self.throttle.record_failure(&identifier, now))
            }
            RateLimitMessage::Check { identifier } => {
                RateLimitReply::Status(self.throttle.is_blocked(&identifier, now))
            }
            RateLimitMessage::Clear { identifier } => {
                RateLimitReply::Cleared(self.throttle.clear(&identifier))
            }
        }
    }

    fn alarm_interval(&self) -> Option<Duration> {
        Some(self.cleanup_interval)
    }

    fn on_alarm(&mut self, now: DateTime<Utc>) {
        let purged = self.throttle.purge_expired(now);
        if purged > 0 {
            tracing::debug!(
                "Purged {} attempt records from {} ({} left)",
                purged,
                self.name,
                self.throttle.len()
            );
        }
    }
}
