//! Enable/disable, retention and eviction across a live session.

use feed_core::{
    engine::EngineConfig,
    item::{Notification, RawBlock},
    BlockHash, ConnectionStatus, SessionConfig,
};
use serde_json::Value;
use std::{num::NonZeroUsize, time::Duration};

use crate::mock_infrastructure::{
    block_hash, create_default_session, create_test_session, create_test_session_config, hash_hex,
    wait_until, BlockResponseBuilder, RpcMockBuilder,
};

const WAIT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn test_disable_clears_everything() {
    let mut mock = RpcMockBuilder::new().await;
    mock.mock_latest_block(
        &BlockResponseBuilder::new(hash_hex(0xc), 12).with_zone_parent(hash_hex(0xb)).build(),
    );
    let _lookup = mock.mock_block_by_hash(&hash_hex(0xb), &Value::Null, 1);

    let session = create_default_session(&mock.url());
    session.set_enabled(true);

    let engine = session.engine();
    let backfill_attempted =
        || engine.items().len() == 1 && engine.ledger_contains(&block_hash(0xb));
    assert!(wait_until(WAIT, backfill_attempted).await);
    assert_eq!(engine.max_height(), 12);

    session.set_enabled(false);

    let stats = session.stats();
    assert_eq!(stats.item_count, 0);
    assert_eq!(stats.ledger_size, 0);
    assert_eq!(stats.inflight, 0);
    assert_eq!(stats.max_height, 0);
    assert!(engine.items().is_empty());
    assert_eq!(session.status(), ConnectionStatus::Disconnected);

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(engine.items().is_empty(), "nothing may repopulate a disabled session");

    session.shutdown().await;
}

#[tokio::test]
async fn test_reenable_rebuilds_from_scratch() {
    let mut mock = RpcMockBuilder::new().await;
    mock.mock_latest_block(&BlockResponseBuilder::new(hash_hex(0xa), 3).build());

    let session = create_default_session(&mock.url());
    session.set_enabled(true);

    let engine = session.engine();
    assert!(wait_until(WAIT, || engine.items().len() == 1).await);
    let first_id = engine.items()[0].id.clone();

    session.set_enabled(false);
    session.set_enabled(true);

    assert!(wait_until(WAIT, || engine.items().len() == 1).await);
    assert_ne!(engine.items()[0].id, first_id, "a new session never reuses ids");
    assert_eq!(engine.max_height(), 3);

    session.shutdown().await;
}

#[tokio::test]
async fn test_eviction_keeps_most_recent_arrivals() {
    let mut mock = RpcMockBuilder::new().await;
    // Heights deliberately decrease so recency and height disagree.
    mock.mock_latest_sequence(vec![
        BlockResponseBuilder::new(hash_hex(0x1), 30).build(),
        BlockResponseBuilder::new(hash_hex(0x2), 20).build(),
        BlockResponseBuilder::new(hash_hex(0x3), 10).build(),
    ]);

    let engine_config = EngineConfig { max_items: 2, ..EngineConfig::default() };
    let session =
        create_test_session(&mock.url(), None, &engine_config, create_test_session_config());
    session.set_enabled(true);

    let engine = session.engine();
    let has_latest = || engine.items().iter().any(|item| item.full_hash == block_hash(0x3));
    assert!(wait_until(WAIT, has_latest).await);

    let hashes: Vec<_> = engine.items().iter().map(|item| item.full_hash).collect();
    assert_eq!(hashes, vec![block_hash(0x3), block_hash(0x2)], "survivors stay in display order");
    assert_eq!(engine.max_height(), 30, "height counter survives eviction");

    session.shutdown().await;
}

#[tokio::test]
async fn test_lowered_cap_applies_on_next_eviction_pass() {
    let mock = RpcMockBuilder::new().await;
    let session_config = SessionConfig {
        eviction_interval: Duration::from_millis(200),
        ..create_test_session_config()
    };
    let session = create_test_session(&mock.url(), None, &EngineConfig::default(), session_config);

    let engine = session.engine();
    let generation = engine.enable();
    for tag in 1..=5u64 {
        let block = RawBlock {
            hash: block_hash(tag),
            zone_parent_hash: if tag == 1 { BlockHash::ZERO } else { block_hash(tag - 1) },
            number: Some(tag),
            order: 2,
            prime_parent_hash: None,
            region_parent_hash: None,
        };
        engine.ingest(generation, &Notification::Block(block));
    }
    assert_eq!(engine.items().len(), 5);

    engine.set_max_items(NonZeroUsize::new(2).unwrap());
    assert_eq!(engine.items().len(), 5, "a cap change is not retroactive");

    assert!(wait_until(WAIT, || engine.items().len() == 2).await);
    let hashes: Vec<_> = engine.items().iter().map(|item| item.full_hash).collect();
    assert_eq!(hashes, vec![block_hash(4), block_hash(5)]);

    session.shutdown().await;
}
