//! Single-consumption records (challenges, authorization codes)
//!
//! State machine per record: `issued -> consumed | expired`. A record can be
//! consumed exactly once; consumed records are kept as tombstones until their
//! original expiry so a replay reports `AlreadyConsumed` instead of `NotFound`.

use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashMap;

/// Result of a consumption attempt. Every variant is an expected outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumeOutcome {
    /// First consumption; carries the stored payload
    Consumed(String),
    AlreadyConsumed,
    Expired,
    NotFound,
}

impl ConsumeOutcome {
    pub fn is_consumed(&self) -> bool {
        matches!(self, Self::Consumed(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordState {
    Issued,
    Consumed,
}

#[derive(Debug, Clone)]
struct SingleUseRecord {
    payload: String,
    expires_at: DateTime<Utc>,
    state: RecordState,
}

/// All single-use records owned by one actor instance.
#[derive(Debug, Default)]
pub struct SingleUseLedger {
    records: HashMap<String, SingleUseRecord>,
}

impl SingleUseLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new record. Returns `false` if the id is already present.
    pub fn issue(
        &mut self,
        record_id: &str,
        payload: String,
        ttl_secs: u64,
        now: DateTime<Utc>,
    ) -> bool {
        if self.records.contains_key(record_id) {
            tracing::warn!("Refusing to reissue existing single-use record {}", record_id);
            return false;
        }

        let ttl = TimeDelta::try_seconds(i64::try_from(ttl_secs).unwrap_or(i64::MAX))
            .unwrap_or(TimeDelta::MAX);
        let expires_at = now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC);

        self.records.insert(
            record_id.to_string(),
            SingleUseRecord {
                payload,
                expires_at,
                state: RecordState::Issued,
            },
        );
        true
    }

    /// Consume a record. Expiry is checked before the state transition.
    pub fn consume(&mut self, record_id: &str, now: DateTime<Utc>) -> ConsumeOutcome {
        let Some(record) = self.records.get_mut(record_id) else {
            return ConsumeOutcome::NotFound;
        };

        match record.state {
            RecordState::Consumed => ConsumeOutcome::AlreadyConsumed,
            RecordState::Issued if now >= record.expires_at => ConsumeOutcome::Expired,
            RecordState::Issued => {
                record.state = RecordState::Consumed;
                ConsumeOutcome::Consumed(std::mem::take(&mut record.payload))
            }
        }
    }

    /// Drop every record past its expiry, consumed or not.
    pub fn purge_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.records.len();
        self.records.retain(|_, record| now < record.expires_at);
        before - self.records.len()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_consume_twice() {
        let mut ledger = SingleUseLedger::new();
        assert!(ledger.issue("chl-1", "payload".to_string(), 300, at(0)));

        assert_eq!(
            ledger.consume("chl-1", at(10)),
            ConsumeOutcome::Consumed("payload".to_string())
        );
        assert_eq!(ledger.consume("chl-1", at(11)), ConsumeOutcome::AlreadyConsumed);
    }

    #[test]
    fn test_expired_record_is_terminal() {
        let mut ledger = SingleUseLedger::new();
        ledger.issue("code-1", "p".to_string(), 60, at(0));

        assert_eq!(ledger.consume("code-1", at(60)), ConsumeOutcome::Expired);
        // Still terminal on retry
        assert_eq!(ledger.consume("code-1", at(61)), ConsumeOutcome::Expired);
    }

    #[test]
    fn test_unknown_record() {
        let mut ledger = SingleUseLedger::new();
        assert_eq!(ledger.consume("missing", at(0)), ConsumeOutcome::NotFound);
    }

    #[test]
    fn test_reissue_is_refused() {
        let mut ledger = SingleUseLedger::new();
        assert!(ledger.issue("chl-2", "first".to_string(), 300, at(0)));
        assert!(!ledger.issue("chl-2", "second".to_string(), 300, at(1)));
        assert_eq!(
            ledger.consume("chl-2", at(2)),
            ConsumeOutcome::Consumed("first".to_string())
        );
    }

    #[test]
    fn test_purge_keeps_live_records_and_tombstones() {
        let mut ledger = SingleUseLedger::new();
        ledger.issue("short", "a".to_string(), 10, at(0));
        ledger.issue("long", "b".to_string(), 600, at(0));
        ledger.issue("used", "c".to_string(), 600, at(0));
        ledger.consume("used", at(1));

        assert_eq!(ledger.purge_expired(at(20)), 1);
        assert_eq!(ledger.len(), 2);
        // Tombstone still reports the replay
        assert_eq!(ledger.consume("used", at(21)), ConsumeOutcome::AlreadyConsumed);

        assert_eq!(ledger.purge_expired(at(600)), 2);
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_huge_ttl_does_not_overflow() {
        let mut ledger = SingleUseLedger::new();
        assert!(ledger.issue("forever", "x".to_string(), u64::MAX, at(0)));
        assert!(ledger.consume("forever", at(1)).is_consumed());
    }
}
