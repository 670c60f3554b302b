//! Missing-parent ledger: hashes that already had their one backfill chance this session.

use std::collections::HashSet;

use crate::types::BlockHash;

/// Fetch-at-most-once set of parent hashes.
///
/// Entries are written synchronously when a gap is detected, before any fetch starts, and
/// are only dropped by [`MissingParentLedger::clear`] on a full reset. This is not an LRU.
#[derive(Debug, Default, Clone)]
pub struct MissingParentLedger {
    hashes: HashSet<BlockHash>,
}

impl MissingParentLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn contains(&self, hash: &BlockHash) -> bool {
        self.hashes.contains(hash)
    }

    /// Records `hash`, returning `true` if it was not already present. The sentinel is
    /// never recorded.
    pub fn mark(&mut self, hash: BlockHash) -> bool {
        if hash.is_sentinel() {
            return false;
        }
        self.hashes.insert(hash)
    }

    /// Records every hash, returning how many were new.
    pub fn mark_all(&mut self, hashes: impl IntoIterator<Item = BlockHash>) -> usize {
        hashes.into_iter().filter(|hash| self.mark(*hash)).count()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BlockHash> {
        self.hashes.iter()
    }

    pub fn clear(&mut self) {
        self.hashes.clear();
    }
}
