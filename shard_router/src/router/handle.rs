use serde::Serialize;
use std::fmt;

use crate::shard::RegionKey;

/// Actor namespaces. Each kind has its own instance space, so the same
/// instance name under two kinds addresses two different actors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorKind {
    Challenge,
    AuthorizationCode,
    RefreshToken,
    Session,
    RateLimit,
}

impl ActorKind {
    /// Type prefix embedded in composite ids minted for this kind.
    pub fn type_prefix(&self) -> &'static str {
        match self {
            Self::Challenge => "chl",
            Self::AuthorizationCode => "ac",
            Self::RefreshToken => "rtf",
            Self::Session => "ses",
            Self::RateLimit => "rl",
        }
    }

    /// Logical key prefix callers use for this kind.
    pub fn key_prefix(&self) -> &'static str {
        match self {
            Self::Challenge => "challenge:",
            Self::AuthorizationCode => "authcode:",
            Self::RefreshToken => "refreshtoken:",
            Self::Session => "session:",
            Self::RateLimit => "ratelimit:",
        }
    }

    /// Kinds reachable through prefix routing of logical keys.
    pub const PREFIX_ROUTED: [ActorKind; 4] = [
        ActorKind::Session,
        ActorKind::AuthorizationCode,
        ActorKind::RefreshToken,
        ActorKind::Challenge,
    ];
}

impl fmt::Display for ActorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key_prefix().trim_end_matches(':'))
    }
}

/// Where to send a call. Derived on every access, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ActorHandle {
    pub kind: ActorKind,
    /// Deterministic name: `{tenant}:{region}:{shard}`, or `{tenant}:default`
    /// for legacy ids
    pub instance_name: String,
    /// Placement hint for the runtime; `None` for the legacy default instance
    pub location_hint: Option<RegionKey>,
}

impl ActorHandle {
    pub(crate) fn sharded(
        kind: ActorKind,
        tenant_id: &str,
        region: RegionKey,
        shard_index: u32,
    ) -> Self {
        Self {
            kind,
            instance_name: format!("{tenant_id}:{region}:{shard_index}"),
            location_hint: Some(region.nearest_capable()),
        }
    }

    pub(crate) fn legacy_default(kind: ActorKind, tenant_id: &str) -> Self {
        Self {
            kind,
            instance_name: format!("{tenant_id}:default"),
            location_hint: None,
        }
    }
}

/// Destination of a logical key under the key-prefix contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteTarget<'a> {
    /// `session:`, `authcode:`, `refreshtoken:` and `challenge:` keys
    Actor {
        kind: ActorKind,
        record_key: &'a str,
    },
    /// Every other key
    CacheAside { key: &'a str },
}

impl<'a> RouteTarget<'a> {
    pub fn classify(logical_key: &'a str) -> Self {
        ActorKind::PREFIX_ROUTED
            .iter()
            .find_map(|kind| {
                logical_key
                    .strip_prefix(kind.key_prefix())
                    .map(|record_key| Self::Actor {
                        kind: *kind,
                        record_key,
                    })
            })
            .unwrap_or(Self::CacheAside { key: logical_key })
    }
}
