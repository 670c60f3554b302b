//! Serialized mutation path over one [`ReconciliationStore`].
//!
//! Poll results, push messages and backfill completions all funnel through
//! [`ReconciliationEngine`]. Each batch runs under one mutex so dedup, append, sort, gap
//! detection and eviction are a single critical section; readers only ever see the
//! lock-free snapshot published after the batch commits.
//!
//! Disable is a hard cancellation boundary: [`ReconciliationEngine::reset`] bumps a
//! generation counter under the same lock, and any batch tagged with an older generation,
//! or arriving while disabled, is discarded.

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use serde::Serialize;
use std::{
    num::NonZeroUsize,
    sync::{
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
        Arc,
    },
};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::{
    item::{
        expand, expand_block, expand_polled, expand_workshare, Candidate, Notification,
        PolledBlock, RawBlock, RawSummary,
    },
    resolver::{BackfillRequest, InflightFetches},
    store::{InsertOutcome, ParentGap, ReconciliationStore},
    types::{BlockHash, Item},
};

/// Tunables for one engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub max_items: usize,
    /// Backfill hops allowed per triggering event; 1 means parents only.
    pub max_backfill_depth: u32,
    pub backfill_queue_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { max_items: 500, max_backfill_depth: 1, backfill_queue_capacity: 256 }
    }
}

/// Where a batch came from; decides the depth of any backfill it triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOrigin {
    Live,
    Backfill { depth: u32 },
}

impl IngestOrigin {
    fn next_depth(self) -> u32 {
        match self {
            Self::Live => 1,
            Self::Backfill { depth } => depth.saturating_add(1),
        }
    }
}

/// Diagnostics snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    pub item_count: usize,
    pub ledger_size: usize,
    pub inflight: usize,
    pub max_height: u64,
    pub max_items: usize,
    pub generation: u64,
    pub enabled: bool,
}

pub struct ReconciliationEngine {
    network: Arc<str>,
    store: Mutex<ReconciliationStore>,
    snapshot: ArcSwap<Vec<Item>>,
    max_height: AtomicU64,
    max_items: AtomicUsize,
    max_backfill_depth: u32,
    inflight: InflightFetches,
    backfill_tx: mpsc::Sender<BackfillRequest>,
    generation: AtomicU64,
    enabled: AtomicBool,
    changes: watch::Sender<u64>,
}

impl ReconciliationEngine {
    /// Creates a disabled engine and the receiving end of its backfill queue.
    #[must_use]
    pub fn new(
        network: impl Into<Arc<str>>,
        config: &EngineConfig,
    ) -> (Arc<Self>, mpsc::Receiver<BackfillRequest>) {
        let network = network.into();
        let (backfill_tx, backfill_rx) = mpsc::channel(config.backfill_queue_capacity.max(1));
        let (changes, _) = watch::channel(0);

        let engine = Arc::new(Self {
            store: Mutex::new(ReconciliationStore::new(Some(Arc::clone(&network)))),
            network,
            snapshot: ArcSwap::from_pointee(Vec::new()),
            max_height: AtomicU64::new(0),
            max_items: AtomicUsize::new(config.max_items.max(1)),
            max_backfill_depth: config.max_backfill_depth,
            inflight: InflightFetches::new(),
            backfill_tx,
            generation: AtomicU64::new(0),
            enabled: AtomicBool::new(false),
            changes,
        });
        (engine, backfill_rx)
    }

    #[must_use]
    pub fn network(&self) -> &Arc<str> {
        &self.network
    }

    /// Opens the engine for ingestion and returns the generation batches must carry.
    pub fn enable(&self) -> u64 {
        let _store = self.store.lock();
        self.enabled.store(true, Ordering::Release);
        let generation = self.generation.load(Ordering::Acquire);
        info!(network = %self.network, generation, "ingestion enabled");
        generation
    }

    /// Full reset: closes ingestion, clears items, ledger, in-flight set and height, and
    /// invalidates every outstanding batch. Returns the new generation.
    pub fn reset(&self) -> u64 {
        let mut store = self.store.lock();
        self.enabled.store(false, Ordering::Release);
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        store.reset();
        self.inflight.clear();
        self.publish(&store);
        drop(store);

        info!(network = %self.network, generation, "ingestion reset");
        generation
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Commits one candidate batch. Returns `None` if the batch was discarded because the
    /// engine is disabled or `generation` is stale.
    pub fn insert(
        &self,
        generation: u64,
        candidates: Vec<Candidate>,
        origin: IngestOrigin,
    ) -> Option<InsertOutcome> {
        self.commit(generation, origin, |store, max_items, inflight| {
            store.insert(candidates, max_items, |hash| inflight.contains(hash))
        })
    }

    pub fn ingest(&self, generation: u64, notification: &Notification) -> Option<InsertOutcome> {
        self.insert(generation, expand(notification), IngestOrigin::Live)
    }

    /// Ingests a poll response: the block's representations plus listed uncles and
    /// workshares, as one batch.
    pub fn ingest_polled(&self, generation: u64, polled: &PolledBlock) -> Option<InsertOutcome> {
        self.insert(generation, expand_polled(polled), IngestOrigin::Live)
    }

    pub fn ingest_workshare(
        &self,
        generation: u64,
        workshare: &RawSummary,
    ) -> Option<InsertOutcome> {
        self.insert(generation, vec![expand_workshare(workshare)], IngestOrigin::Live)
    }

    /// Commits a fetched parent block.
    ///
    /// At the depth limit, the block's own parents are ledgered first so they are never
    /// fetched; the block is then inserted like any other batch.
    pub fn complete_backfill(
        &self,
        request: &BackfillRequest,
        block: &RawBlock,
    ) -> Option<InsertOutcome> {
        let depth = request.depth;
        let limit = self.max_backfill_depth;
        let origin = IngestOrigin::Backfill { depth };
        self.commit(request.generation, origin, |store, max_items, inflight| {
            if depth >= limit {
                let ledgered = store.ledger_ancestors(block);
                debug!(hash = %block.hash, ledgered, "ledgered ancestors of backfilled block");
            }
            store.insert(expand_block(block), max_items, |hash| inflight.contains(hash))
        })
    }

    /// Queues a backfill for `hash` on behalf of a reader. Goes through the same ledger as
    /// gaps found during insertion. Returns `false` if the request was suppressed.
    pub fn request_backfill(&self, hash: BlockHash) -> bool {
        let mut store = self.store.lock();
        if !self.is_enabled() || hash.is_sentinel() {
            return false;
        }
        if !store.mark_missing(hash) || self.inflight.contains(&hash) {
            debug!(network = %self.network, hash = %hash, "backfill already attempted");
            return false;
        }
        let generation = self.generation();
        drop(store);

        self.enqueue(BackfillRequest { hash, generation, depth: 1 })
    }

    /// Runs an eviction pass with the current cap. Returns how many items were dropped.
    pub fn evict_now(&self) -> usize {
        let mut store = self.store.lock();
        let evicted = store.evict(self.max_items());
        if evicted > 0 {
            self.publish(&store);
        }
        evicted
    }

    /// Latest committed item collection, ascending by height.
    #[must_use]
    pub fn items(&self) -> Arc<Vec<Item>> {
        self.snapshot.load_full()
    }

    #[must_use]
    pub fn max_height(&self) -> u64 {
        self.max_height.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn max_items(&self) -> usize {
        self.max_items.load(Ordering::Relaxed)
    }

    /// Changes the retention cap. Applies on the next eviction pass.
    pub fn set_max_items(&self, max_items: NonZeroUsize) {
        let previous = self.max_items.swap(max_items.get(), Ordering::Relaxed);
        info!(
            network = %self.network,
            previous,
            max_items = max_items.get(),
            "retention cap changed"
        );
    }

    #[must_use]
    pub fn inflight(&self) -> &InflightFetches {
        &self.inflight
    }

    #[must_use]
    pub fn ledger_contains(&self, hash: &BlockHash) -> bool {
        self.store.lock().ledger().contains(hash)
    }

    #[must_use]
    pub fn stats(&self) -> EngineStats {
        let store = self.store.lock();
        EngineStats {
            item_count: store.len(),
            ledger_size: store.ledger().len(),
            inflight: self.inflight.len(),
            max_height: store.max_height(),
            max_items: self.max_items(),
            generation: self.generation(),
            enabled: self.is_enabled(),
        }
    }

    /// Version counter bumped after every committed change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    fn commit<F>(&self, generation: u64, origin: IngestOrigin, apply: F) -> Option<InsertOutcome>
    where
        F: FnOnce(&mut ReconciliationStore, usize, &InflightFetches) -> InsertOutcome,
    {
        let mut store = self.store.lock();
        if !self.is_enabled() || self.generation() != generation {
            debug!(network = %self.network, generation, "discarding batch from stale session");
            return None;
        }

        let outcome = apply(&mut store, self.max_items(), &self.inflight);
        if outcome.changed() || outcome.evicted > 0 {
            self.publish(&store);
        }
        drop(store);

        if outcome.changed() {
            debug!(
                network = %self.network,
                appended = outcome.appended,
                updated = outcome.updated,
                gaps = outcome.gaps.len(),
                evicted = outcome.evicted,
                "batch committed"
            );
        }
        self.queue_gaps(&outcome.gaps, origin, generation);
        Some(outcome)
    }

    fn queue_gaps(&self, gaps: &[ParentGap], origin: IngestOrigin, generation: u64) {
        if gaps.is_empty() {
            return;
        }

        let depth = origin.next_depth();
        if depth > self.max_backfill_depth {
            debug!(
                network = %self.network,
                count = gaps.len(),
                depth,
                "gaps beyond backfill depth left ledgered"
            );
            return;
        }

        for gap in gaps {
            self.enqueue(BackfillRequest { hash: gap.hash, generation, depth });
        }
    }

    fn enqueue(&self, request: BackfillRequest) -> bool {
        match self.backfill_tx.try_send(request) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(request)) => {
                warn!(
                    network = %self.network,
                    hash = %request.hash,
                    "backfill queue full, gap left unfilled"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(request)) => {
                debug!(network = %self.network, hash = %request.hash, "backfill worker stopped");
                false
            }
        }
    }

    fn publish(&self, store: &ReconciliationStore) {
        self.snapshot.store(Arc::new(store.items().to_vec()));
        self.max_height.store(store.max_height(), Ordering::Release);
        self.changes.send_modify(|version| *version = version.wrapping_add(1));
    }
}
