//! Multi-representation expansion: one raw block becomes 1-3 candidates by consensus order.

use super::raw::{PolledBlock, RawBlock, RawSummary};
use crate::types::{BlockHash, ItemType};

/// Order value of a prime-level block.
pub const PRIME_ORDER: u64 = 0;
/// Order value of a region-level block.
pub const REGION_ORDER: u64 = 1;

/// An item before the store has assigned it an id and an insertion timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub item_type: ItemType,
    pub hash: BlockHash,
    pub parent_hash: BlockHash,
    pub number: Option<u64>,
    pub order: Option<u64>,
    pub included_in: Option<BlockHash>,
}

impl Candidate {
    fn block(block: &RawBlock, item_type: ItemType, parent_hash: Option<BlockHash>) -> Self {
        Self {
            item_type,
            hash: block.hash,
            parent_hash: parent_hash.unwrap_or(BlockHash::ZERO),
            number: block.number,
            order: Some(block.order),
            included_in: None,
        }
    }

    fn summary(summary: &RawSummary, item_type: ItemType) -> Self {
        Self {
            item_type,
            hash: summary.hash,
            parent_hash: summary.parent_hash,
            number: summary.number,
            order: None,
            included_in: summary.including_block_hash,
        }
    }
}

/// Expands a raw block into its hierarchy representations.
///
/// - order 0: prime, region and zone
/// - order 1: region (falling back to the prime parent) and zone
/// - order 2+: zone only
///
/// An absent header-level parent becomes the sentinel hash and therefore never backfills.
#[must_use]
pub fn expand_block(block: &RawBlock) -> Vec<Candidate> {
    let zone = Candidate::block(block, ItemType::ZoneBlock, Some(block.zone_parent_hash));

    match block.order {
        PRIME_ORDER => vec![
            Candidate::block(block, ItemType::PrimeBlock, block.prime_parent_hash),
            Candidate::block(block, ItemType::RegionBlock, block.region_parent_hash),
            zone,
        ],
        REGION_ORDER => vec![
            Candidate::block(
                block,
                ItemType::RegionBlock,
                block.region_parent_hash.or(block.prime_parent_hash),
            ),
            zone,
        ],
        _ => vec![zone],
    }
}

#[must_use]
pub fn expand_uncle(uncle: &RawSummary) -> Candidate {
    Candidate::summary(uncle, ItemType::Uncle)
}

#[must_use]
pub fn expand_workshare(workshare: &RawSummary) -> Candidate {
    Candidate::summary(workshare, ItemType::Workshare)
}

/// Expands a whole poll response into one batch: block representations first, then uncles,
/// then workshares.
#[must_use]
pub fn expand_polled(polled: &PolledBlock) -> Vec<Candidate> {
    let mut candidates = expand_block(&polled.block);
    candidates.extend(polled.uncles.iter().map(expand_uncle));
    candidates.extend(polled.workshares.iter().map(expand_workshare));
    candidates
}
