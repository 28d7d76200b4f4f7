//! Refresh-token families: atomic rotation with reuse detection
//!
//! A family tracks the one currently valid token id and every id it has
//! superseded. Presenting a superseded id means a token was replayed, most likely
//! stolen, and the whole family is revoked for good.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use subtle::ConstantTimeEq;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FamilyState {
    Active,
    Revoked,
}

/// Result of a rotation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RotationOutcome {
    /// The presented id was current; `token_id` is the new current id
    Rotated { token_id: String },
    /// A superseded id was presented; the family is now revoked
    ReuseDetected,
    /// The presented id never belonged to this family
    InvalidToken,
    /// The family was revoked earlier
    FamilyRevoked,
}

/// One refresh-token lineage.
#[derive(Debug, Clone)]
pub struct TokenFamily {
    current: String,
    superseded: HashSet<String>,
    state: FamilyState,
    reuse_detected: bool,
    created_at: DateTime<Utc>,
    rotated_at: Option<DateTime<Utc>>,
}

impl TokenFamily {
    pub fn new(initial_token_id: String, now: DateTime<Utc>) -> Self {
        Self {
            current: initial_token_id,
            superseded: HashSet::new(),
            state: FamilyState::Active,
            reuse_detected: false,
            created_at: now,
            rotated_at: None,
        }
    }

    /// Rotate `presented` to `next`.
    ///
    /// Callers must not retry a rotation whose outcome they did not observe.
    pub fn rotate(&mut self, presented: &str, next: String, now: DateTime<Utc>) -> RotationOutcome {
        if self.state == FamilyState::Revoked {
            return RotationOutcome::FamilyRevoked;
        }

        if bool::from(presented.as_bytes().ct_eq(self.current.as_bytes())) {
            let previous = std::mem::replace(&mut self.current, next);
            self.superseded.insert(previous);
            self.rotated_at = Some(now);
            return RotationOutcome::Rotated {
                token_id: self.current.clone(),
            };
        }

        if self.superseded.contains(presented) {
            self.state = FamilyState::Revoked;
            self.reuse_detected = true;
            return RotationOutcome::ReuseDetected;
        }

        RotationOutcome::InvalidToken
    }

    pub fn revoke(&mut self) {
        self.state = FamilyState::Revoked;
    }

    pub fn state(&self) -> FamilyState {
        self.state
    }

    pub fn reuse_detected(&self) -> bool {
        self.reuse_detected
    }

    /// Number of rotations performed so far.
    pub fn rotations(&self) -> usize {
        self.superseded.len()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        self.rotated_at.unwrap_or(self.created_at)
    }
}

/// Snapshot of a family for status queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FamilyStatus {
    pub state: FamilyState,
    pub reuse_detected: bool,
    pub rotations: usize,
}

/// All families owned by one actor instance.
#[derive(Debug, Default)]
pub struct FamilyLedger {
    families: HashMap<String, TokenFamily>,
}

impl FamilyLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a family. Returns `false` if the family id is taken.
    pub fn start(&mut self, family_id: &str, initial_token_id: String, now: DateTime<Utc>) -> bool {
        if self.families.contains_key(family_id) {
            return false;
        }
        self.families
            .insert(family_id.to_string(), TokenFamily::new(initial_token_id, now));
        true
    }

    /// Rotate within a family. An unknown family is an invalid token.
    pub fn rotate(
        &mut self,
        family_id: &str,
        presented: &str,
        next: String,
        now: DateTime<Utc>,
    ) -> RotationOutcome {
        match self.families.get_mut(family_id) {
            Some(family) => family.rotate(presented, next, now),
            None => RotationOutcome::InvalidToken,
        }
    }

    /// Revoke a family. Returns `false` if it does not exist.
    pub fn revoke(&mut self, family_id: &str) -> bool {
        match self.families.get_mut(family_id) {
            Some(family) => {
                family.revoke();
                true
            }
            None => false,
        }
    }

    pub fn status(&self, family_id: &str) -> Option<FamilyStatus> {
        self.families.get(family_id).map(|family| FamilyStatus {
            state: family.state(),
            reuse_detected: family.reuse_detected(),
            rotations: family.rotations(),
        })
    }

    /// Drop families idle since before `idle_cutoff`.
    ///
    /// Revoked families are kept as long as active ones so that a replayed
    /// token keeps reporting `FamilyRevoked` rather than `InvalidToken`.
    pub fn purge_idle(&mut self, idle_cutoff: DateTime<Utc>) -> usize {
        let before = self.families.len();
        self.families
            .retain(|_, family| family.last_activity() >= idle_cutoff);
        before - self.families.len()
    }

    pub fn len(&self) -> usize {
        self.families.len()
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }
}
