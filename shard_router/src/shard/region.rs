//! Region capability table
//!
//! Which regions can host actors, and where records for the regions that cannot
//! are placed instead. The table is business configuration: changing a mapping
//! that existing records depend on requires a generation bump.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::errors::ShardError;

/// Every region key that may appear in a configuration document or a record id.
///
/// A key stays known after it stops being actor-capable so that ids minted
/// while it was capable still decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionKey {
    /// Western North America
    Wnam,
    /// Eastern North America
    Enam,
    /// South America
    Sam,
    /// Western Europe
    Weur,
    /// Eastern Europe
    Eeur,
    /// Asia-Pacific
    Apac,
    /// Oceania
    Oc,
    /// Africa
    Afr,
    /// Middle East
    Me,
}

/// Regions that can host actor instances.
pub const CAPABLE_REGIONS: [RegionKey; 5] = [
    RegionKey::Wnam,
    RegionKey::Enam,
    RegionKey::Weur,
    RegionKey::Eeur,
    RegionKey::Apac,
];

impl RegionKey {
    pub const ALL: [RegionKey; 9] = [
        RegionKey::Wnam,
        RegionKey::Enam,
        RegionKey::Sam,
        RegionKey::Weur,
        RegionKey::Eeur,
        RegionKey::Apac,
        RegionKey::Oc,
        RegionKey::Afr,
        RegionKey::Me,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Wnam => "wnam",
            Self::Enam => "enam",
            Self::Sam => "sam",
            Self::Weur => "weur",
            Self::Eeur => "eeur",
            Self::Apac => "apac",
            Self::Oc => "oc",
            Self::Afr => "afr",
            Self::Me => "me",
        }
    }

    /// Whether actors can be instantiated in this region.
    pub fn is_capable(&self) -> bool {
        CAPABLE_REGIONS.contains(self)
    }

    /// The capable region that hosts actors on behalf of this one.
    ///
    /// Capable regions map to themselves.
    pub fn nearest_capable(&self) -> RegionKey {
        match self {
            Self::Afr | Self::Me => Self::Weur,
            Self::Oc => Self::Apac,
            Self::Sam => Self::Enam,
            capable => *capable,
        }
    }
}

impl fmt::Display for RegionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RegionKey {
    type Err = ShardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RegionKey::ALL
            .iter()
            .find(|region| region.as_str() == s)
            .copied()
            .ok_or_else(|| ShardError::UnknownRegion(s.to_string()))
    }
}
