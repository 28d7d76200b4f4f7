use chrono::{DateTime, TimeDelta, Utc};
use std::time::Duration;

use crate::actor::Actor;
use crate::guard::{FamilyLedger, FamilyStatus, RotationOutcome};
use crate::router::ActorHandle;

#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Families without activity for this long are dropped
    pub idle_timeout: Duration,
    pub cleanup_interval: Duration,
}

#[derive(Debug)]
pub enum RefreshMessage {
    Start {
        family_id: String,
        token_id: String,
    },
    Rotate {
        family_id: String,
        presented: String,
        next: String,
    },
    Revoke {
        family_id: String,
    },
    Status {
        family_id: String,
    },
}

#[derive(Debug, PartialEq, Eq)]
pub enum RefreshReply {
    Started(bool),
    Rotated(RotationOutcome),
    Revoked(bool),
    Status(Option<FamilyStatus>),
}

pub struct RefreshTokenActor {
    name: String,
    families: FamilyLedger,
    idle_timeout: TimeDelta,
    cleanup_interval: Duration,
}

impl Actor for RefreshTokenActor {
    type Config = RefreshConfig;
    type Message = RefreshMessage;
    type Reply = RefreshReply;

    fn new(handle: &ActorHandle, config: &RefreshConfig) -> Self {
        Self {
            name: handle.instance_name.clone(),
            families: FamilyLedger::new(),
            idle_timeout: TimeDelta::from_std(config.idle_timeout).unwrap_or(TimeDelta::MAX),
            cleanup_interval: config.cleanup_interval,
        }
    }

    fn handle(&mut self, message: RefreshMessage, now: DateTime<Utc>) -> RefreshReply {
        match message {
            RefreshMessage::Start {
                family_id,
                token_id,
            } => RefreshReply::Started(self.families.start(&family_id, token_id, now)),
            RefreshMessage::Rotate {
                family_id,
                presented,
                next,
            } => {
                let outcome = self.families.rotate(&family_id, &presented, next, now);
                if outcome == RotationOutcome::ReuseDetected {
                    tracing::warn!(
                        "Refresh token reuse in family {} on {}; family revoked",
                        family_id,
                        self.name
                    );
                }
                RefreshReply::Rotated(outcome)
            }
            RefreshMessage::Revoke { family_id } => {
                RefreshReply::Revoked(self.families.revoke(&family_id))
            }
            RefreshMessage::Status { family_id } => {
                RefreshReply::Status(self.families.status(&family_id))
            }
        }
    }

    fn alarm_interval(&self) -> Option<Duration> {
        Some(self.cleanup_interval)
    }

    fn on_alarm(&mut self, now: DateTime<Utc>) {
        let cutoff = now.checked_sub_signed(self.idle_timeout).unwrap_or(DateTime::<Utc>::MIN_UTC);
        let purged = self.families.purge_idle(cutoff);
        if purged > 0 {
            tracing::debug!("Purged {} idle token families from {}", purged, self.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::FamilyState;
    use crate::router::ActorKind;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    fn actor() -> RefreshTokenActor {
        let handle = ActorHandle {
            kind: ActorKind::RefreshToken,
            instance_name: "acme:enam:2".to_string(),
            location_hint: None,
        };
        RefreshTokenActor::new(
            &handle,
            &RefreshConfig {
                idle_timeout: Duration::from_secs(100),
                cleanup_interval: Duration::from_secs(10),
            },
        )
    }

    fn rotate(presented: &str, next: &str) -> RefreshMessage {
        RefreshMessage::Rotate {
            family_id: "f1".to_string(),
            presented: presented.to_string(),
            next: next.to_string(),
        }
    }

    #[test]
    fn test_rotation_chain_and_reuse() {
        let mut actor = actor();
        assert_eq!(
            actor.handle(
                RefreshMessage::Start {
                    family_id: "f1".to_string(),
                    token_id: "t0".to_string()
                },
                at(0)
            ),
            RefreshReply::Started(true)
        );

        assert_eq!(
            actor.handle(rotate("t0", "t1"), at(1)),
            RefreshReply::Rotated(RotationOutcome::Rotated {
                token_id: "t1".to_string()
            })
        );

        // Replaying the superseded token revokes the whole family
        assert_eq!(
            actor.handle(rotate("t0", "t2"), at(2)),
            RefreshReply::Rotated(RotationOutcome::ReuseDetected)
        );
        assert_eq!(
            actor.handle(rotate("t1", "t3"), at(3)),
            RefreshReply::Rotated(RotationOutcome::FamilyRevoked)
        );

        let RefreshReply::Status(Some(status)) = actor.handle(
            RefreshMessage::Status {
                family_id: "f1".to_string(),
            },
            at(4),
        ) else {
            panic!("expected family status");
        };
        assert_eq!(status.state, FamilyState::Revoked);
        assert!(status.reuse_detected);
    }

    #[test]
    fn test_alarm_drops_idle_families() {
        let mut actor = actor();
        actor.handle(
            RefreshMessage::Start {
                family_id: "f1".to_string(),
                token_id: "t0".to_string(),
            },
            at(0),
        );

        actor.on_alarm(at(50));
        assert!(matches!(
            actor.handle(
                RefreshMessage::Status {
                    family_id: "f1".to_string()
                },
                at(50)
            ),
            RefreshReply::Status(Some(_))
        ));

        actor.on_alarm(at(101));
        assert_eq!(
            actor.handle(
                RefreshMessage::Status {
                    family_id: "f1".to_string()
                },
                at(101)
            ),
            RefreshReply::Status(None)
        );
    }
}
