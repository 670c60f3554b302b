//! Tests for the reconciliation store, grouped by concern.

use crate::{
    item::{expand_block, Candidate, RawBlock},
    store::ReconciliationStore,
    types::{BlockHash, ItemType},
};


// ============================================================================
// Shared Test Helpers
// ============================================================================

pub(crate) fn hash(byte: u8) -> BlockHash {
    BlockHash::new([byte; 32])
}

pub(crate) fn create_test_store() -> ReconciliationStore {
    ReconciliationStore::new(None)
}

pub(crate) fn create_zone_block(hash_byte: u8, parent: BlockHash, number: u64) -> RawBlock {
    RawBlock {
        hash: hash(hash_byte),
        zone_parent_hash: parent,
        number: Some(number),
        order: 2,
        prime_parent_hash: None,
        region_parent_hash: None,
    }
}

pub(crate) fn create_side_record(
    item_type: ItemType,
    hash_byte: u8,
    parent: BlockHash,
    included_in: Option<BlockHash>,
) -> Candidate {
    Candidate {
        item_type,
        hash: hash(hash_byte),
        parent_hash: parent,
        number: Some(u64::from(hash_byte)),
        order: None,
        included_in,
    }
}

/// Inserts with nothing in flight and a generous cap.
pub(crate) fn insert_all(
    store: &mut ReconciliationStore,
    block: &RawBlock,
) -> super::InsertOutcome {
    store.insert(expand_block(block), 1_000, |_| false)
}
