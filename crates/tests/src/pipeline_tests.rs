//! Poll-driven ingestion through the JSON-RPC source.

use feed_core::{ConnectionStatus, ItemType};
use serde_json::Value;
use std::time::Duration;

use crate::mock_infrastructure::{
    block_hash, create_default_session, hash_hex, summary, wait_until, BlockResponseBuilder,
    RpcMockBuilder, POLL_METHOD, SENTINEL_HASH,
};

const WAIT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn test_prime_block_expands_with_side_records() {
    let mut mock = RpcMockBuilder::new().await;
    let block = BlockResponseBuilder::new(hash_hex(0x10), 100)
        .with_order(0)
        .with_header_parents(SENTINEL_HASH, SENTINEL_HASH)
        .with_uncle(summary(&hash_hex(0x20), SENTINEL_HASH, 99))
        .with_workshare(summary(&hash_hex(0x21), SENTINEL_HASH, 100))
        .build();
    mock.mock_latest_block(&block);

    let session = create_default_session(&mock.url());
    session.set_enabled(true);

    let engine = session.engine();
    assert!(wait_until(WAIT, || engine.items().len() == 5).await);

    let items = engine.items();
    let mut block_types: Vec<_> = items
        .iter()
        .filter(|item| item.full_hash == block_hash(0x10))
        .map(|item| item.item_type)
        .collect();
    block_types.sort();
    assert_eq!(block_types, vec![ItemType::PrimeBlock, ItemType::RegionBlock, ItemType::ZoneBlock]);

    for item in items.iter().filter(|item| item.item_type.is_side_record()) {
        assert_eq!(
            item.included_in,
            Some(block_hash(0x10)),
            "{} should link to its block",
            item.id
        );
    }
    assert_eq!(engine.max_height(), 100);
    assert_eq!(session.status(), ConnectionStatus::Connected);

    session.shutdown().await;
}

#[tokio::test]
async fn test_repeated_polls_are_idempotent() {
    let mut mock = RpcMockBuilder::new().await;
    mock.mock_latest_block(&BlockResponseBuilder::new(hash_hex(0xa), 7).build());

    let session = create_default_session(&mock.url());
    session.set_enabled(true);

    let engine = session.engine();
    assert!(wait_until(WAIT, || engine.items().len() == 1).await);
    let first = engine.items();

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(engine.items(), first, "re-polling the same block must not change the store");

    session.shutdown().await;
}

#[tokio::test]
async fn test_simple_chain_needs_no_backfill() {
    let mut mock = RpcMockBuilder::new().await;
    let a = BlockResponseBuilder::new(hash_hex(0xa), 0).build();
    let b = BlockResponseBuilder::new(hash_hex(0xb), 1).with_zone_parent(hash_hex(0xa)).build();
    mock.mock_latest_sequence(vec![a, b]);
    let lookup_a = mock.mock_block_by_hash(&hash_hex(0xa), &Value::Null, 0);

    let session = create_default_session(&mock.url());
    session.set_enabled(true);

    let engine = session.engine();
    assert!(wait_until(WAIT, || engine.items().len() == 2).await);

    let hashes: Vec<_> = engine.items().iter().map(|item| item.full_hash).collect();
    assert_eq!(hashes, vec![block_hash(0xa), block_hash(0xb)]);
    assert_eq!(engine.stats().ledger_size, 0);
    lookup_a.assert_async().await;

    session.shutdown().await;
}

#[tokio::test]
async fn test_malformed_poll_is_skipped() {
    let mut mock = RpcMockBuilder::new().await;
    let malformed = BlockResponseBuilder::new(hash_hex(0xe), 5).without_wo_header().build();
    let valid = BlockResponseBuilder::new(hash_hex(0xa), 6).build();
    mock.mock_latest_sequence(vec![malformed, valid]);

    let session = create_default_session(&mock.url());
    session.set_enabled(true);

    let engine = session.engine();
    assert!(wait_until(WAIT, || engine.items().len() == 1).await);
    assert_eq!(engine.items()[0].full_hash, block_hash(0xa));
    assert!(session.is_enabled());

    session.shutdown().await;
}

#[tokio::test]
async fn test_rpc_error_reports_error_status() {
    let mut mock = RpcMockBuilder::new().await;
    mock.mock_rpc_error(POLL_METHOD, -32603, "internal error");

    let session = create_default_session(&mock.url());
    session.set_enabled(true);

    assert!(wait_until(WAIT, || session.status() == ConnectionStatus::Error).await);
    assert!(session.last_error().is_some_and(|e| e.contains("internal error")));
    assert!(session.engine().items().is_empty());
    assert!(session.is_enabled(), "poll failures never stop the loop");

    session.shutdown().await;
}

#[tokio::test]
async fn test_null_poll_result_is_no_data() {
    let mut mock = RpcMockBuilder::new().await;
    mock.mock_latest_block(&Value::Null);

    let session = create_default_session(&mock.url());
    session.set_enabled(true);

    assert!(wait_until(WAIT, || session.status() == ConnectionStatus::Connected).await);
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(session.engine().items().is_empty());
    assert!(mock.verify_all_called());

    session.shutdown().await;
}
