//! Generation-tagged record identifiers
//!
//! `g{generation}:{regionKey}:{shardIndex}:{typePrefix}_{uuid}`
//!
//! The string is handed to clients inside higher-level artifacts (challenge ids,
//! refresh tokens), so the format is bit-exact and decoding is strict: anything
//! the encoder could not have produced is rejected.

use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::errors::IdError;
use crate::shard::RegionKey;

const SEGMENT_SEPARATOR: char = ':';
const PREFIX_SEPARATOR: char = '_';

/// Decoded composite identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompositeId {
    pub generation: u32,
    pub region: RegionKey,
    pub shard_index: u32,
    pub type_prefix: String,
    pub uuid: Uuid,
}

impl CompositeId {
    /// Build an id with a fresh random uuid.
    pub fn new(
        generation: u32,
        region: RegionKey,
        shard_index: u32,
        type_prefix: &str,
    ) -> Result<Self, IdError> {
        validate_type_prefix(type_prefix)?;
        Ok(Self {
            generation,
            region,
            shard_index,
            type_prefix: type_prefix.to_string(),
            uuid: Uuid::new_v4(),
        })
    }

    /// Strictly parse an id string.
    pub fn decode(s: &str) -> Result<Self, IdError> {
        let segments: Vec<&str> = s.split(SEGMENT_SEPARATOR).collect();
        let [generation, region, shard_index, tail] = segments.as_slice() else {
            return Err(IdError::Malformed(format!(
                "expected 4 segments, found {}",
                segments.len()
            )));
        };

        let generation = generation
            .strip_prefix('g')
            .ok_or_else(|| IdError::Malformed("generation must start with 'g'".to_string()))
            .and_then(|digits| parse_canonical_u32(digits, "generation"))?;

        let region = region
            .parse::<RegionKey>()
            .map_err(|e| IdError::Malformed(e.to_string()))?;

        let shard_index = parse_canonical_u32(shard_index, "shard index")?;

        let (type_prefix, uuid) = tail
            .split_once(PREFIX_SEPARATOR)
            .ok_or_else(|| IdError::Malformed("missing type prefix separator".to_string()))?;
        validate_type_prefix(type_prefix)?;
        let uuid = parse_canonical_uuid(uuid)?;

        Ok(Self {
            generation,
            region,
            shard_index,
            type_prefix: type_prefix.to_string(),
            uuid,
        })
    }

    /// The wire form of the id.
    pub fn encode(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CompositeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "g{}:{}:{}:{}_{}",
            self.generation,
            self.region,
            self.shard_index,
            self.type_prefix,
            self.uuid.hyphenated()
        )
    }
}

impl FromStr for CompositeId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

/// Encode a new id with a fresh uuid suffix.
pub fn encode(
    generation: u32,
    region: RegionKey,
    shard_index: u32,
    type_prefix: &str,
) -> Result<String, IdError> {
    CompositeId::new(generation, region, shard_index, type_prefix).map(|id| id.encode())
}

/// Decode an id string.
pub fn decode(s: &str) -> Result<CompositeId, IdError> {
    CompositeId::decode(s)
}

/// Cheap check separating composite ids from legacy identifiers.
///
/// Does not validate; a `true` answer still has to go through [`decode`].
pub fn is_composite_format(s: &str) -> bool {
    let mut chars = s.chars();
    chars.next() == Some('g')
        && chars.next().is_some_and(|c| c.is_ascii_digit())
        && s.matches(SEGMENT_SEPARATOR).count() == 3
}

/// Identifier of an actor-owned record, new or legacy.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordId {
    Composite(CompositeId),
    /// Bare uuid minted before sharding; routes to the tenant's default instance
    Legacy(Uuid),
}

impl RecordId {
    /// Parse either format. Composite-looking strings never fall back to the
    /// legacy parser.
    pub fn parse(s: &str) -> Result<Self, IdError> {
        if is_composite_format(s) {
            return CompositeId::decode(s).map(Self::Composite);
        }
        parse_canonical_uuid(s).map(Self::Legacy)
    }

    pub fn as_composite(&self) -> Option<&CompositeId> {
        match self {
            Self::Composite(id) => Some(id),
            Self::Legacy(_) => None,
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Composite(id) => write!(f, "{id}"),
            Self::Legacy(uuid) => write!(f, "{}", uuid.hyphenated()),
        }
    }
}

fn validate_type_prefix(prefix: &str) -> Result<(), IdError> {
    if prefix.is_empty() {
        return Err(IdError::InvalidTypePrefix("empty".to_string()));
    }
    if !prefix
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
    {
        return Err(IdError::InvalidTypePrefix(prefix.to_string()));
    }
    Ok(())
}

fn parse_canonical_u32(digits: &str, field: &str) -> Result<u32, IdError> {
    let canonical = !digits.is_empty()
        && digits.bytes().all(|b| b.is_ascii_digit())
        && (digits == "0" || !digits.starts_with('0'));
    if !canonical {
        return Err(IdError::Malformed(format!("{field} is not a canonical integer")));
    }
    digits
        .parse::<u32>()
        .map_err(|_| IdError::Malformed(format!("{field} out of range")))
}

fn parse_canonical_uuid(s: &str) -> Result<Uuid, IdError> {
    let uuid = Uuid::try_parse(s).map_err(|e| IdError::Malformed(format!("invalid uuid: {e}")))?;
    // Reject braced, simple, urn and upper-case forms so ids round-trip exactly
    if uuid.hyphenated().to_string() != s {
        return Err(IdError::Malformed("uuid is not in canonical form".to_string()));
    }
    Ok(uuid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const UUID: &str = "3f2b8c1e-9a4d-4e7b-8c2a-1d5e6f7a8b9c";

    #[test]
    fn test_encode_format() {
        let id = CompositeId {
            generation: 2,
            region: RegionKey::Apac,
            shard_index: 5,
            type_prefix: "chl".to_string(),
            uuid: Uuid::parse_str(UUID).unwrap(),
        };
        assert_eq!(id.encode(), format!("g2:apac:5:chl_{UUID}"));
    }

    #[test]
    fn test_encode_generates_fresh_uuids() {
        let first = encode(1, RegionKey::Weur, 0, "ac").unwrap();
        let second = encode(1, RegionKey::Weur, 0, "ac").unwrap();
        assert_ne!(first, second);
        assert!(first.starts_with("g1:weur:0:ac_"));
    }

    #[test]
    fn test_decode_valid() {
        let id = decode(&format!("g0:eeur:12:rtf_{UUID}")).unwrap();
        assert_eq!(id.generation, 0);
        assert_eq!(id.region, RegionKey::Eeur);
        assert_eq!(id.shard_index, 12);
        assert_eq!(id.type_prefix, "rtf");
        assert_eq!(id.uuid.to_string(), UUID);
    }

    #[test]
    fn test_decode_accepts_retired_regions() {
        // Non-capable but known regions still decode
        let id = decode(&format!("g1:afr:0:chl_{UUID}")).unwrap();
        assert_eq!(id.region, RegionKey::Afr);
    }

    #[test]
    fn test_decode_rejects_malformed() {
        let cases = [
            String::new(),
            "g1:weur:0".to_string(),
            format!("g1:weur:0:chl_{UUID}:extra"),
            format!("1:weur:0:chl_{UUID}"),
            format!("g:weur:0:chl_{UUID}"),
            format!("g-1:weur:0:chl_{UUID}"),
            format!("g+1:weur:0:chl_{UUID}"),
            format!("g01:weur:0:chl_{UUID}"),
            format!("g4294967296:weur:0:chl_{UUID}"),
            format!("g1:mars:0:chl_{UUID}"),
            format!("g1:WEUR:0:chl_{UUID}"),
            format!("g1:weur:-1:chl_{UUID}"),
            format!("g1:weur:007:chl_{UUID}"),
            format!("g1:weur: 1:chl_{UUID}"),
            format!("g1:weur:0:{UUID}"),
            format!("g1:weur:0:_{UUID}"),
            format!("g1:weur:0:CHL_{UUID}"),
            format!("g1:weur:0:ch-l_{UUID}"),
            format!("g1:weur:0:chl_{}", UUID.to_uppercase()),
            format!("g1:weur:0:chl_{}", UUID.replace('-', "")),
            format!("g1:weur:0:chl_{{{UUID}}}"),
            format!("g1:weur:0:chl_not-a-uuid"),
            format!("g1:weur:0:chl_{UUID} "),
        ];
        for case in cases {
            assert!(decode(&case).is_err(), "should reject {case:?}");
        }
    }

    #[test]
    fn test_type_prefix_with_underscore_is_rejected() {
        // The prefix separator is the first underscore, so "rt_f" splits early
        assert!(decode(&format!("g1:weur:0:rt_f_{UUID}")).is_err());
        assert!(matches!(
            encode(1, RegionKey::Weur, 0, "rt_f"),
            Err(IdError::InvalidTypePrefix(_))
        ));
    }

    #[test]
    fn test_is_composite_format() {
        assert!(is_composite_format(&format!("g1:weur:0:chl_{UUID}")));
        assert!(!is_composite_format(UUID));
        assert!(!is_composite_format("gx:weur:0:chl_abc"));
        assert!(!is_composite_format("g1:weur:0"));
        assert!(!is_composite_format(""));
    }

    #[test]
    fn test_record_id_parses_both_formats() {
        let legacy = RecordId::parse(UUID).unwrap();
        assert_eq!(legacy, RecordId::Legacy(Uuid::parse_str(UUID).unwrap()));
        assert_eq!(legacy.to_string(), UUID);
        assert!(legacy.as_composite().is_none());

        let raw = format!("g7:wnam:3:chl_{UUID}");
        let composite = RecordId::parse(&raw).unwrap();
        assert_eq!(composite.to_string(), raw);
        assert_eq!(composite.as_composite().unwrap().generation, 7);

        // A composite-looking string that fails to decode is not retried as legacy
        assert!(RecordId::parse(&format!("g7:mars:3:chl_{UUID}")).is_err());
        assert!(RecordId::parse("session-42").is_err());
    }

    fn region_strategy() -> impl Strategy<Value = RegionKey> {
        prop::sample::select(RegionKey::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn prop_decode_inverts_encode(
            generation in any::<u32>(),
            region in region_strategy(),
            shard_index in any::<u32>(),
            prefix in "[a-z0-9]{1,12}",
        ) {
            let original = CompositeId::new(generation, region, shard_index, &prefix).unwrap();
            let encoded = original.encode();
            prop_assert!(is_composite_format(&encoded));
            let decoded = decode(&encoded).unwrap();
            prop_assert_eq!(&decoded, &original);
            prop_assert_eq!(decoded.encode(), encoded);
        }
    }
}
