//! Core value types shared by every layer of the feed.
//!
//! [`Item`] is the unit renderers draw. One physical block may appear as up to three items
//! (prime, region and zone representations) that share a [`BlockHash`] but differ in
//! [`ItemType`]; the pair is the identity key ([`ItemKey`]).

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr, sync::Arc};

use crate::utils::parse_hex_array;

/// Number of leading hash bytes kept in the display form.
const SHORT_HASH_BYTES: usize = 4;

/// A 32-byte block, uncle or workshare hash.
///
/// The all-zero hash is the "no parent" sentinel used by genesis blocks and never triggers
/// a backfill.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct BlockHash([u8; 32]);

impl BlockHash {
    /// The all-zero sentinel hash.
    pub const ZERO: Self = Self([0u8; 32]);

    #[must_use]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parses a `0x`-prefixed (or bare) 64 character hex string.
    #[must_use]
    pub fn from_hex(hex: &str) -> Option<Self> {
        parse_hex_array::<32>(hex).map(Self)
    }

    #[inline]
    #[must_use]
    pub fn is_sentinel(&self) -> bool {
        self.0 == [0u8; 32]
    }

    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Display truncation, e.g. `0x1a2b3c4d`. Cosmetic only; never used as an identity.
    #[must_use]
    pub fn short(&self) -> String {
        format!("0x{}", hex::encode(&self.0[..SHORT_HASH_BYTES]))
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockHash({self})")
    }
}

impl FromStr for BlockHash {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s).ok_or_else(|| format!("invalid 32-byte hex hash: {s}"))
    }
}

impl Serialize for BlockHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BlockHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// Hierarchy level or side-record kind of an [`Item`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ItemType {
    PrimeBlock,
    RegionBlock,
    ZoneBlock,
    Uncle,
    Workshare,
}

impl ItemType {
    /// Short lowercase label used in item ids and log fields.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PrimeBlock => "prime",
            Self::RegionBlock => "region",
            Self::ZoneBlock => "zone",
            Self::Uncle => "uncle",
            Self::Workshare => "workshare",
        }
    }

    /// Returns `true` for uncles and workshares, the only items whose `included_in` link can
    /// be attached after insertion.
    #[must_use]
    pub fn is_side_record(&self) -> bool {
        matches!(self, Self::Uncle | Self::Workshare)
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of an item within a store: the pair (`full_hash`, `item_type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItemKey {
    pub hash: BlockHash,
    pub item_type: ItemType,
}

impl ItemKey {
    #[must_use]
    pub const fn new(hash: BlockHash, item_type: ItemType) -> Self {
        Self { hash, item_type }
    }
}

/// One displayable record in the reconciliation store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    /// Unique per insertion; never reused within a store.
    pub id: String,
    pub item_type: ItemType,
    pub full_hash: BlockHash,
    pub short_hash: String,
    /// Same-level predecessor for blocks, producing chain parent for uncles/workshares.
    pub full_parent_hash: BlockHash,
    pub short_parent_hash: String,
    /// Block height; `None` when the source did not report one. Zero is a real height.
    pub number: Option<u64>,
    /// Raw consensus order the block was expanded from. Diagnostics only.
    pub order: Option<u64>,
    /// Insertion time in milliseconds, non-decreasing per store. Not consensus time.
    pub timestamp: u64,
    /// Zone block that reported this uncle/workshare as included. Set at most once.
    pub included_in: Option<BlockHash>,
    pub chain_name: Option<Arc<str>>,
}

impl Item {
    #[inline]
    #[must_use]
    pub fn key(&self) -> ItemKey {
        ItemKey::new(self.full_hash, self.item_type)
    }

    /// Key the parent must have to count as present: same hash, same item type.
    #[inline]
    #[must_use]
    pub fn parent_key(&self) -> ItemKey {
        ItemKey::new(self.full_parent_hash, self.item_type)
    }

    /// Height used for display ordering; unknown heights sort as zero.
    #[inline]
    #[must_use]
    pub fn sort_number(&self) -> u64 {
        self.number.unwrap_or(0)
    }

    #[inline]
    #[must_use]
    pub fn has_parent(&self) -> bool {
        !self.full_parent_hash.is_sentinel()
    }
}
