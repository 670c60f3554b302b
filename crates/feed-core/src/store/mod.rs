//! Reconciliation store: the authoritative, deduplicated item collection of one network.
//!
//! The store is plain synchronous data. Serialization of concurrent writers is the job of
//! [`crate::engine::ReconciliationEngine`], which holds it behind a mutex so that the dedup
//! check, append, sort, gap detection and eviction of one batch form a single critical
//! section.
//!
//! # Insertion
//!
//! 1. Dedup each candidate against the `(hash, item_type)` key set. A duplicate side record
//!    (uncle or workshare) may attach `included_in` once; everything else is absorbed.
//! 2. Append new candidates with a fresh id and the batch timestamp.
//! 3. Stable-sort ascending by height (unknown height as zero).
//! 4. For each new item with a non-sentinel parent that is absent from the collection and
//!    the ledger: ledger it, and report a [`ParentGap`] unless a fetch for it is in flight.
//! 5. Evict down to the cap.

pub mod eviction;
pub mod ledger;

use std::{
    collections::HashSet,
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use tracing::{debug, trace};

pub use eviction::{by_relevance, evict, retain_most_relevant};
pub use ledger::MissingParentLedger;

use crate::{
    item::{Candidate, RawBlock},
    types::{BlockHash, Item, ItemKey, ItemType},
};

/// A parent reference that needs a backfill fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParentGap {
    /// Missing parent hash.
    pub hash: BlockHash,
    /// Type of the child item that referenced it.
    pub item_type: ItemType,
    pub child: BlockHash,
}

/// What one [`ReconciliationStore::insert`] call changed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InsertOutcome {
    pub appended: usize,
    /// Side records that received their `included_in` link.
    pub updated: usize,
    pub gaps: Vec<ParentGap>,
    pub evicted: usize,
}

impl InsertOutcome {
    /// `false` when the batch was entirely made of duplicates.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.appended > 0 || self.updated > 0
    }
}

/// Per-store insertion time source.
///
/// Stamps are milliseconds since the epoch, strictly increasing between batches even if
/// the wall clock stalls or steps backwards.
#[derive(Debug, Default)]
struct InsertionClock {
    last: u64,
}

impl InsertionClock {
    fn stamp(&mut self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0);
        self.last = now.max(self.last.saturating_add(1));
        self.last
    }
}

#[derive(Debug, Default)]
pub struct ReconciliationStore {
    items: Vec<Item>,
    keys: HashSet<ItemKey>,
    ledger: MissingParentLedger,
    max_height: u64,
    clock: InsertionClock,
    /// Survives resets so ids are never reused.
    next_seq: u64,
    chain_name: Option<Arc<str>>,
}

impl ReconciliationStore {
    #[must_use]
    pub fn new(chain_name: Option<Arc<str>>) -> Self {
        Self { chain_name, ..Self::default() }
    }

    /// Applies one candidate batch. See the module docs for the exact steps.
    ///
    /// `is_inflight` reports hashes whose fetch is already running; they are ledgered but
    /// not reported as gaps again.
    pub fn insert<F>(
        &mut self,
        candidates: Vec<Candidate>,
        max_items: usize,
        is_inflight: F,
    ) -> InsertOutcome
    where
        F: Fn(&BlockHash) -> bool,
    {
        let mut outcome = InsertOutcome::default();
        let mut fresh: Vec<(ItemType, BlockHash, BlockHash)> = Vec::new();
        let mut stamp = None;

        for candidate in candidates {
            let key = ItemKey::new(candidate.hash, candidate.item_type);

            if self.keys.contains(&key) {
                if self.attach_inclusion(&key, candidate.included_in) {
                    outcome.updated += 1;
                } else {
                    trace!(
                        hash = %candidate.hash,
                        item_type = %candidate.item_type,
                        "duplicate absorbed"
                    );
                }
                continue;
            }

            let timestamp = *stamp.get_or_insert_with(|| self.clock.stamp());
            let item = self.build_item(candidate, timestamp);

            if let Some(number) = item.number {
                self.max_height = self.max_height.max(number);
            }
            fresh.push((item.item_type, item.full_hash, item.full_parent_hash));
            self.keys.insert(key);
            self.items.push(item);
            outcome.appended += 1;
        }

        if outcome.appended == 0 {
            return outcome;
        }

        self.items.sort_by_key(Item::sort_number);

        for (item_type, child, parent) in fresh {
            if parent.is_sentinel() || self.keys.contains(&ItemKey::new(parent, item_type)) {
                continue;
            }
            // Ledgered even when already in flight, so every running fetch stays covered.
            if !self.ledger.mark(parent) || is_inflight(&parent) {
                continue;
            }
            outcome.gaps.push(ParentGap { hash: parent, item_type, child });
        }

        outcome.evicted = self.evict(max_items);
        outcome
    }

    fn attach_inclusion(&mut self, key: &ItemKey, included_in: Option<BlockHash>) -> bool {
        let Some(including) = included_in else { return false };
        if !key.item_type.is_side_record() {
            return false;
        }

        match self.items.iter_mut().find(|item| item.key() == *key) {
            Some(item) if item.included_in.is_none() => {
                item.included_in = Some(including);
                debug!(hash = %key.hash, included_in = %including, "attached inclusion");
                true
            }
            _ => false,
        }
    }

    fn build_item(&mut self, candidate: Candidate, timestamp: u64) -> Item {
        let seq = self.next_seq;
        self.next_seq += 1;
        let short_hash = candidate.hash.short();

        Item {
            id: format!("{}-{}-{}-{}", candidate.item_type, short_hash, timestamp, seq),
            item_type: candidate.item_type,
            full_hash: candidate.hash,
            short_hash,
            full_parent_hash: candidate.parent_hash,
            short_parent_hash: candidate.parent_hash.short(),
            number: candidate.number,
            order: candidate.order,
            timestamp,
            included_in: candidate.included_in,
            chain_name: self.chain_name.clone(),
        }
    }

    /// Trims the collection to `max_items`, returning how many items were dropped.
    pub fn evict(&mut self, max_items: usize) -> usize {
        let evicted = retain_most_relevant(&mut self.items, max_items);
        for item in &evicted {
            self.keys.remove(&item.key());
        }
        if !evicted.is_empty() {
            debug!(evicted = evicted.len(), remaining = self.items.len(), "evicted items");
        }
        evicted.len()
    }

    /// Ledgers every parent named by a backfilled block so none of them is fetched.
    pub fn ledger_ancestors(&mut self, block: &RawBlock) -> usize {
        self.ledger.mark_all(block.parent_hashes())
    }

    /// Records `hash` in the ledger. Returns `false` if it was already there.
    pub fn mark_missing(&mut self, hash: BlockHash) -> bool {
        self.ledger.mark(hash)
    }

    /// Drops all items, ledger entries and the height counter.
    pub fn reset(&mut self) {
        self.items.clear();
        self.keys.clear();
        self.ledger.clear();
        self.max_height = 0;
    }

    #[must_use]
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn contains(&self, key: &ItemKey) -> bool {
        self.keys.contains(key)
    }

    #[must_use]
    pub fn get(&self, key: &ItemKey) -> Option<&Item> {
        self.items.iter().find(|item| item.key() == *key)
    }

    /// Highest block number ever inserted since the last reset. Never lowered by eviction.
    #[must_use]
    pub fn max_height(&self) -> u64 {
        self.max_height
    }

    #[must_use]
    pub fn ledger(&self) -> &MissingParentLedger {
        &self.ledger
    }

    #[must_use]
    pub fn chain_name(&self) -> Option<&Arc<str>> {
        self.chain_name.as_ref()
    }
}

#[cfg(test)]
mod tests;
