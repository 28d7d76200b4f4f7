//! Shard key hashing
//!
//! Routing depends on every process (and every re-implementation) agreeing on
//! which shard a key lands in, so the hash here is a fixed compatibility contract:
//! 32-bit FNV-1a over the UTF-8 bytes of the key, no seed. Changing it reshuffles
//! all existing key-addressed routing.

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// Selects how a shard key is turned into a hash input.
///
/// Call sites pick a strategy explicitly; nothing falls back to the legacy
/// variant implicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShardKeyStrategy {
    /// FNV-1a over the raw key (user id, challenge id, IP address, DID).
    #[default]
    Fnv1a,
    /// Email keys are trimmed and lower-cased before hashing.
    #[deprecated(note = "shard by user id; remove once email-sharded records have expired")]
    LegacyEmail,
}

impl ShardKeyStrategy {
    /// Hash a key according to this strategy.
    #[allow(deprecated)]
    pub fn hash(&self, key: &str) -> u32 {
        match self {
            Self::Fnv1a => fnv1a_32(key.as_bytes()),
            Self::LegacyEmail => fnv1a_32(key.trim().to_lowercase().as_bytes()),
        }
    }

    /// Map a key to a shard index in `0..shard_count`.
    ///
    /// # Panics
    /// Panics when `shard_count` is zero.
    pub fn shard_index(&self, key: &str, shard_count: u32) -> u32 {
        assert!(shard_count > 0, "shard_count must be greater than zero");
        self.hash(key) % shard_count
    }
}

/// 32-bit FNV-1a.
pub fn fnv1a_32(bytes: &[u8]) -> u32 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u32::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

/// Hash a shard key with the current strategy.
pub fn hash(key: &str) -> u32 {
    ShardKeyStrategy::Fnv1a.hash(key)
}

/// `hash(key) mod shard_count` with the current strategy.
///
/// # Panics
/// Panics when `shard_count` is zero.
pub fn shard_index(key: &str, shard_count: u32) -> u32 {
    ShardKeyStrategy::Fnv1a.shard_index(key, shard_count)
}
