//! In-flight fetch set with RAII cleanup.
//!
//! Narrower than the ledger: an entry lives only while a fetch for that hash is running.
//! [`InflightGuard`] removes its entry on drop, so success, failure, timeout, task abort
//! and panic all release it.

use dashmap::{mapref::entry::Entry, DashMap};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tokio::time::{Duration, Instant};
use tracing::{trace, warn};

use crate::types::BlockHash;

/// Bookkeeping for one running fetch.
#[derive(Debug, Clone, Copy)]
pub struct InflightFetch {
    /// Distinguishes this fetch from a later one for the same hash after a reset.
    ticket: u64,
    pub started_at: Instant,
}

/// Shared set of hashes currently being fetched. Cloning shares the set.
#[derive(Debug, Clone, Default)]
pub struct InflightFetches {
    entries: Arc<DashMap<BlockHash, InflightFetch>>,
    next_ticket: Arc<AtomicU64>,
}

impl InflightFetches {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `hash` for fetching. Returns `None` if another fetch already holds it.
    #[must_use]
    pub fn try_begin(&self, hash: BlockHash) -> Option<InflightGuard> {
        match self.entries.entry(hash) {
            Entry::Occupied(_) => None,
            Entry::Vacant(vacant) => {
                let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
                vacant.insert(InflightFetch { ticket, started_at: Instant::now() });
                trace!(hash = %hash, ticket, "fetch started");
                Some(InflightGuard { entries: Arc::clone(&self.entries), hash, ticket })
            }
        }
    }

    #[must_use]
    pub fn contains(&self, hash: &BlockHash) -> bool {
        self.entries.contains_key(hash)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forgets every entry. Guards still alive become no-ops on drop.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Drops entries older than `max_age`. Only reachable if a guard leaked.
    pub fn prune_stale(&self, max_age: Duration) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|hash, fetch| {
            let stale = now.duration_since(fetch.started_at) > max_age;
            if stale {
                warn!(hash = %hash, "removing stale in-flight entry");
            }
            !stale
        });
        before.saturating_sub(self.entries.len())
    }
}

/// Holds one in-flight entry; removes it on drop.
#[derive(Debug)]
pub struct InflightGuard {
    entries: Arc<DashMap<BlockHash, InflightFetch>>,
    hash: BlockHash,
    ticket: u64,
}

impl InflightGuard {
    #[must_use]
    pub fn hash(&self) -> BlockHash {
        self.hash
    }
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        let ticket = self.ticket;
        self.entries.remove_if(&self.hash, |_, fetch| fetch.ticket == ticket);
        trace!(hash = %self.hash, ticket, "fetch finished");
    }
}
