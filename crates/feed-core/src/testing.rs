//! In-memory [`EventSource`] for unit tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
    time::Duration,
};
use tokio::sync::mpsc;

use crate::{
    item::{PolledBlock, RawBlock, RawSummary},
    source::{EventSource, PushEvent, SourceError},
    types::BlockHash,
};

pub(crate) fn hash(byte: u8) -> BlockHash {
    BlockHash::new([byte; 32])
}

pub(crate) fn zone_block(hash_byte: u8, parent: BlockHash, number: u64) -> RawBlock {
    RawBlock {
        hash: hash(hash_byte),
        zone_parent_hash: parent,
        number: Some(number),
        order: 2,
        prime_parent_hash: None,
        region_parent_hash: None,
    }
}

pub(crate) fn workshare(hash_byte: u8, parent: BlockHash) -> RawSummary {
    RawSummary {
        hash: hash(hash_byte),
        parent_hash: parent,
        number: None,
        including_block_hash: None,
    }
}

#[derive(Default)]
pub(crate) struct MockSource {
    pub blocks: Mutex<HashMap<BlockHash, RawBlock>>,
    pub latest: Mutex<Option<PolledBlock>>,
    pub push_events: Mutex<Vec<PushEvent>>,
    pub fetch_delay: Duration,
    pub fail_fetches: AtomicBool,
    pub fail_polls: AtomicBool,
    pub push_enabled: bool,
    pub fetch_calls: AtomicUsize,
    pub poll_calls: AtomicUsize,
    pub subscribe_calls: AtomicUsize,
}

impl MockSource {
    pub(crate) fn with_blocks(blocks: impl IntoIterator<Item = RawBlock>) -> Self {
        let source = Self::default();
        source.blocks.lock().extend(blocks.into_iter().map(|b| (b.hash, b)));
        source
    }

    pub(crate) fn set_latest(&self, block: RawBlock) {
        let polled = PolledBlock { block, uncles: Vec::new(), workshares: Vec::new() };
        *self.latest.lock() = Some(polled);
    }

    pub(crate) fn fetches(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn polls(&self) -> usize {
        self.poll_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn subscriptions(&self) -> usize {
        self.subscribe_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventSource for MockSource {
    async fn poll_latest(&self) -> Result<Option<PolledBlock>, SourceError> {
        self.poll_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_polls.load(Ordering::SeqCst) {
            return Err(SourceError::ConnectionFailed("mock poll failure".to_string()));
        }
        Ok(self.latest.lock().clone())
    }

    async fn fetch_by_hash(&self, hash: &BlockHash) -> Result<Option<RawBlock>, SourceError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if !self.fetch_delay.is_zero() {
            tokio::time::sleep(self.fetch_delay).await;
        }
        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err(SourceError::ConnectionFailed("mock failure".to_string()));
        }
        Ok(self.blocks.lock().get(hash).cloned())
    }

    fn supports_push(&self) -> bool {
        self.push_enabled
    }

    async fn subscribe(&self, sink: mpsc::Sender<PushEvent>) -> Result<(), SourceError> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        let events: Vec<_> = std::mem::take(&mut *self.push_events.lock());
        let _ = sink.send(PushEvent::Connected).await;
        for event in events {
            let _ = sink.send(event).await;
        }
        Ok(())
    }
}
