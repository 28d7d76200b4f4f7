use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashMap;
use std::time::Duration;

use crate::actor::Actor;
use crate::router::ActorHandle;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub cleanup_interval: Duration,
}

#[derive(Debug)]
pub enum SessionMessage {
    Put {
        session_id: String,
        payload: String,
        ttl_secs: u64,
    },
    /// Replace a live session; never creates one
    Update {
        session_id: String,
        payload: String,
        ttl_secs: u64,
    },
    Get {
        session_id: String,
    },
    Delete {
        session_id: String,
    },
}

#[derive(Debug, PartialEq, Eq)]
pub enum SessionReply {
    Stored,
    Updated(bool),
    Found(Option<String>),
    Deleted(bool),
}

#[derive(Debug)]
struct SessionEntry {
    payload: String,
    expires_at: DateTime<Utc>,
}

fn expiry(now: DateTime<Utc>, ttl_secs: u64) -> DateTime<Utc> {
    let ttl = TimeDelta::try_seconds(i64::try_from(ttl_secs).unwrap_or(i64::MAX))
        .unwrap_or(TimeDelta::MAX);
    now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Sessions of one shard. Unlike single-use records they are read many times
/// and overwritten in place.
pub struct SessionActor {
    name: String,
    sessions: HashMap<String, SessionEntry>,
    cleanup_interval: Duration,
}

impl Actor for SessionActor {
    type Config = SessionConfig;
    type Message = SessionMessage;
    type Reply = SessionReply;

    fn new(handle: &ActorHandle, config: &SessionConfig) -> Self {
        Self {
            name: handle.instance_name.clone(),
            sessions: HashMap::new(),
            cleanup_interval: config.cleanup_interval,
        }
    }

    fn handle(&mut self, message: SessionMessage, now: DateTime<Utc>) -> SessionReply {
        match message {
            SessionMessage::Put {
                session_id,
                payload,
                ttl_secs,
            } => {
                let expires_at = expiry(now, ttl_secs);
                self.sessions
                    .insert(session_id, SessionEntry { payload, expires_at });
                SessionReply::Stored
            }
            SessionMessage::Update {
                session_id,
                payload,
                ttl_secs,
            } => match self.sessions.get_mut(&session_id) {
                Some(entry) if now < entry.expires_at => {
                    entry.payload = payload;
                    entry.expires_at = expiry(now, ttl_secs);
                    SessionReply::Updated(true)
                }
                _ => SessionReply::Updated(false),
            },
            SessionMessage::Get { session_id } => {
                let payload = self
                    .sessions
                    .get(&session_id)
                    .filter(|entry| now < entry.expires_at)
                    .map(|entry| entry.payload.clone());
                SessionReply::Found(payload)
            }
            SessionMessage::Delete { session_id } => {
                SessionReply::Deleted(self.sessions.remove(&session_id).is_some())
            }
        }
    }

    fn alarm_interval(&self) -> Option<Duration> {
        Some(self.cleanup_interval)
    }

    fn on_alarm(&mut self, now: DateTime<Utc>) {
        let before = self.sessions.len();
        self.sessions.retain(|_, entry| now < entry.expires_at);
        let purged = before - self.sessions.len();
        if purged > 0 {
            tracing::debug!("Purged {} expired sessions from {}", purged, self.name);
        }
    }
}
