//! Typed, validated notifications produced by the wire parser.

use crate::types::BlockHash;

/// A block header as reported by a poll or a point lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBlock {
    pub hash: BlockHash,
    pub zone_parent_hash: BlockHash,
    pub number: Option<u64>,
    /// Decoded consensus order: 0 prime, 1 region, 2 and above zone.
    pub order: u64,
    pub prime_parent_hash: Option<BlockHash>,
    pub region_parent_hash: Option<BlockHash>,
}

impl RawBlock {
    /// Every non-sentinel parent hash this header names, zone parent first.
    #[must_use]
    pub fn parent_hashes(&self) -> Vec<BlockHash> {
        [Some(self.zone_parent_hash), self.prime_parent_hash, self.region_parent_hash]
            .into_iter()
            .flatten()
            .filter(|hash| !hash.is_sentinel())
            .collect()
    }
}

/// Summary shape shared by uncles and workshares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSummary {
    pub hash: BlockHash,
    /// Producing chain parent, not the including block.
    pub parent_hash: BlockHash,
    pub number: Option<u64>,
    /// Zone block that listed this record, when it arrived inside a polled block.
    pub including_block_hash: Option<BlockHash>,
}

/// A polled block together with the uncles and workshares it listed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolledBlock {
    pub block: RawBlock,
    pub uncles: Vec<RawSummary>,
    pub workshares: Vec<RawSummary>,
}

/// Any single ingress notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Block(RawBlock),
    Uncle(RawSummary),
    Workshare(RawSummary),
}
