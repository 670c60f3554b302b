//! One-hop parent backfill through the by-hash lookup.

use feed_core::{
    item::{Notification, RawBlock},
    BlockHash, ConnectionStatus, ItemKey,
};
use serde_json::Value;
use std::{collections::HashSet, sync::Arc, time::Duration};

use crate::mock_infrastructure::{
    block_hash, create_default_session, hash_hex, wait_until, BlockResponseBuilder,
    RpcMockBuilder, LOOKUP_METHOD, SENTINEL_HASH,
};

const WAIT: Duration = Duration::from_secs(5);

fn zone_block(tag: u64, parent: BlockHash, number: u64) -> RawBlock {
    RawBlock {
        hash: block_hash(tag),
        zone_parent_hash: parent,
        number: Some(number),
        order: 2,
        prime_parent_hash: None,
        region_parent_hash: None,
    }
}

#[tokio::test]
async fn test_gap_triggers_single_one_hop_backfill() {
    let mut mock = RpcMockBuilder::new().await;
    mock.mock_latest_block(
        &BlockResponseBuilder::new(hash_hex(0xc), 2).with_zone_parent(hash_hex(0xb)).build(),
    );
    let lookup_b = mock.mock_block_by_hash(
        &hash_hex(0xb),
        &BlockResponseBuilder::new(hash_hex(0xb), 1).with_zone_parent(hash_hex(0xa)).build(),
        1,
    );
    let lookup_a = mock.mock_block_by_hash(&hash_hex(0xa), &Value::Null, 0);

    let session = create_default_session(&mock.url());
    session.set_enabled(true);

    let engine = session.engine();
    assert!(wait_until(WAIT, || engine.items().len() == 2).await);

    let hashes: Vec<_> = engine.items().iter().map(|item| item.full_hash).collect();
    assert_eq!(hashes, vec![block_hash(0xb), block_hash(0xc)]);
    assert_eq!(engine.items()[1].full_parent_hash, engine.items()[0].full_hash);
    assert!(engine.ledger_contains(&block_hash(0xa)), "grandparent is ledgered, not fetched");

    // Several more polls of the same block must not re-trigger anything.
    tokio::time::sleep(Duration::from_millis(400)).await;
    lookup_b.assert_async().await;
    lookup_a.assert_async().await;

    session.shutdown().await;
}

#[tokio::test]
async fn test_concurrent_references_issue_one_fetch() {
    let mut mock = RpcMockBuilder::new().await;
    let lookup = mock.mock_block_by_hash(
        &hash_hex(0xf0),
        &BlockResponseBuilder::new(hash_hex(0xf0), 1).build(),
        1,
    );

    let session = create_default_session(&mock.url());
    let engine = Arc::clone(session.engine());
    let generation = engine.enable();

    let handles: Vec<_> = (0..8u64)
        .map(|i| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                let block = zone_block(0x100 + i, block_hash(0xf0), 2);
                engine.ingest(generation, &Notification::Block(block));
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    let parent_landed = || engine.items().iter().any(|item| item.full_hash == block_hash(0xf0));
    assert!(wait_until(WAIT, parent_landed).await);
    assert_eq!(engine.items().len(), 9);
    lookup.assert_async().await;

    session.shutdown().await;
}

#[tokio::test]
async fn test_failed_backfill_leaves_permanent_gap() {
    let mut mock = RpcMockBuilder::new().await;
    mock.mock_latest_block(
        &BlockResponseBuilder::new(hash_hex(0xc), 2).with_zone_parent(hash_hex(0xb)).build(),
    );
    mock.mock_server_error(LOOKUP_METHOD);

    let session = create_default_session(&mock.url());
    session.set_enabled(true);

    let engine = session.engine();
    assert!(wait_until(WAIT, || engine.ledger_contains(&block_hash(0xb))).await);
    assert!(wait_until(WAIT, || engine.inflight().is_empty()).await);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(engine.items().len(), 1);
    assert!(engine.ledger_contains(&block_hash(0xb)));
    assert_eq!(
        session.status(),
        ConnectionStatus::Connected,
        "backfill failures do not affect status"
    );

    session.shutdown().await;
}

#[tokio::test]
async fn test_unknown_parent_is_not_an_error() {
    let mut mock = RpcMockBuilder::new().await;
    mock.mock_latest_block(
        &BlockResponseBuilder::new(hash_hex(0xc), 2).with_zone_parent(hash_hex(0xb)).build(),
    );
    let lookup = mock.mock_block_by_hash(&hash_hex(0xb), &Value::Null, 1);

    let session = create_default_session(&mock.url());
    session.set_enabled(true);

    let engine = session.engine();
    assert!(wait_until(WAIT, || lookup.matched()).await);
    assert!(wait_until(WAIT, || engine.inflight().is_empty()).await);
    assert_eq!(engine.items().len(), 1);
    assert!(engine.ledger_contains(&block_hash(0xb)));

    session.shutdown().await;
}

#[tokio::test]
async fn test_every_parent_link_is_present_or_ledgered() {
    let mut mock = RpcMockBuilder::new().await;
    // A region-order block with both a missing region parent and a missing zone parent.
    let block = BlockResponseBuilder::new(hash_hex(0x50), 50)
        .with_order(1)
        .with_zone_parent(hash_hex(0x4f))
        .with_header_parents(SENTINEL_HASH, hash_hex(0x40))
        .build();
    mock.mock_latest_block(&block);
    let zone_parent =
        BlockResponseBuilder::new(hash_hex(0x4f), 49).with_zone_parent(hash_hex(0x4e)).build();
    let _lookup_zone = mock.mock_block_by_hash(&hash_hex(0x4f), &zone_parent, 1);
    let _lookup_region = mock.mock_block_by_hash(&hash_hex(0x40), &Value::Null, 1);

    let session = create_default_session(&mock.url());
    session.set_enabled(true);

    let engine = session.engine();
    assert!(wait_until(WAIT, || engine.items().len() == 3).await);
    assert!(wait_until(WAIT, || engine.inflight().is_empty()).await);

    let items = engine.items();
    let keys: HashSet<ItemKey> = items.iter().map(|item| item.key()).collect();
    for item in items.iter().filter(|item| item.has_parent()) {
        assert!(
            keys.contains(&item.parent_key()) || engine.ledger_contains(&item.full_parent_hash),
            "{} has a dangling parent {}",
            item.id,
            item.full_parent_hash
        );
    }

    session.shutdown().await;
}
