use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::actor::Actor;
use crate::guard::{ConsumeOutcome, SingleUseLedger};
use crate::router::ActorHandle;

/// Shared by challenges and authorization codes.
#[derive(Debug, Clone)]
pub struct SingleUseConfig {
    pub cleanup_interval: Duration,
}

#[derive(Debug)]
pub enum SingleUseMessage {
    Issue {
        record_id: String,
        payload: String,
        ttl_secs: u64,
    },
    Consume {
        record_id: String,
    },
}

#[derive(Debug, PartialEq, Eq)]
pub enum SingleUseReply {
    /// `false` when the id was already issued
    Issued(bool),
    Consumed(ConsumeOutcome),
}

pub struct SingleUseActor {
    name: String,
    ledger: SingleUseLedger,
    cleanup_interval: Duration,
}

impl Actor for SingleUseActor {
    type Config = SingleUseConfig;
    type Message = SingleUseMessage;
    type Reply = SingleUseReply;

    fn new(handle: &ActorHandle, config: &SingleUseConfig) -> Self {
        Self {
            name: handle.instance_name.clone(),
            ledger: SingleUseLedger::new(),
            cleanup_interval: config.cleanup_interval,
        }
    }

    fn handle(&mut self, message: SingleUseMessage, now: DateTime<Utc>) -> SingleUseReply {
        match message {
            SingleUseMessage::Issue {
                record_id,
                payload,
                ttl_secs,
            } => SingleUseReply::Issued(self.ledger.issue(&record_id, payload, ttl_secs, now)),
            SingleUseMessage::Consume { record_id } => {
                let outcome = self.ledger.consume(&record_id, now);
                if outcome == ConsumeOutcome::AlreadyConsumed {
                    tracing::info!("Replay of consumed record {} on {}", record_id, self.name);
                }
                SingleUseReply::Consumed(outcome)
            }
        }
    }

    fn alarm_interval(&self) -> Option<Duration> {
        Some(self.cleanup_interval)
    }

    fn on_alarm(&mut self, now: DateTime<Utc>) {
        let purged = self.ledger.purge_expired(now);
        if purged > 0 {
            tracing::debug!("Purged {} expired records from {}", purged, self.name);
        }
    }
}
