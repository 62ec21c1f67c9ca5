//! Integration tests for `PostgresStore` against a real `PostgreSQL` instance.
//!
//! These exercise `CursorStore` and `ReorgStore` directly — the cursor,
//! the reorg ticket lock, the block hash history, and the versioned-table
//! rewind — against the actual schema in `migrations/`.

mod common;

use pdp_indexer::ports::store::{BlockCursor, CursorStore, ReorgStore};
use pdp_indexer::types::primitives::BlockHash;
use pdp_indexer::types::reorg::ReorgTicket;

use common::fixtures::{TestDb, projection_fixtures};

const CHAIN_ID: u64 = 314;

#[tokio::test]
async fn cursor_roundtrips_through_get_and_set() {
    let db = TestDb::new().await;

    assert!(db.store.get_cursor(CHAIN_ID).await.unwrap().is_none());

    let cursor = BlockCursor { height: 100.into(), hash: BlockHash::new([1u8; 32]), parent_hash: BlockHash::new([0u8; 32]) };
    db.store.set_cursor(CHAIN_ID, cursor).await.unwrap();

    let loaded = db.store.get_cursor(CHAIN_ID).await.unwrap().unwrap();
    assert_eq!(loaded.height, cursor.height);
    assert_eq!(loaded.hash, cursor.hash);
    assert_eq!(loaded.parent_hash, cursor.parent_hash);
}

#[tokio::test]
async fn setting_cursor_again_overwrites_the_single_row() {
    let db = TestDb::new().await;

    db.store
        .set_cursor(CHAIN_ID, BlockCursor { height: 100.into(), hash: BlockHash::new([1u8; 32]), parent_hash: BlockHash::new([0u8; 32]) })
        .await
        .unwrap();
    db.store
        .set_cursor(CHAIN_ID, BlockCursor { height: 101.into(), hash: BlockHash::new([2u8; 32]), parent_hash: BlockHash::new([1u8; 32]) })
        .await
        .unwrap();

    let loaded = db.store.get_cursor(CHAIN_ID).await.unwrap().unwrap();
    assert_eq!(loaded.height.get(), 101);
}

#[tokio::test]
async fn block_hash_history_records_and_prunes() {
    let db = TestDb::new().await;

    for height in 1..=10u64 {
        db.store.record_block_hash(CHAIN_ID, height.into(), BlockHash::new([height as u8; 32]), BlockHash::new([(height - 1) as u8; 32])).await.unwrap();
    }

    assert_eq!(db.store.block_hash_at(CHAIN_ID, 5.into()).await.unwrap(), Some(BlockHash::new([5u8; 32])));
    assert_eq!(db.store.block_hash_at(CHAIN_ID, 999.into()).await.unwrap(), None);

    let pruned = db.store.prune_block_history(CHAIN_ID, 10.into(), 3).await.unwrap();
    assert_eq!(pruned, 6);
    assert_eq!(db.store.block_hash_at(CHAIN_ID, 5.into()).await.unwrap(), None);
    assert_eq!(db.store.block_hash_at(CHAIN_ID, 8.into()).await.unwrap(), Some(BlockHash::new([8u8; 32])));
}

#[tokio::test]
async fn reorg_ticket_lock_is_single_slot_per_chain() {
    let db = TestDb::new().await;

    assert!(db.store.active_ticket(CHAIN_ID).await.unwrap().is_none());

    let ticket = ReorgTicket::new(100.into(), chrono::Utc::now());
    db.store.create_ticket(CHAIN_ID, &ticket).await.unwrap();

    let active = db.store.active_ticket(CHAIN_ID).await.unwrap().unwrap();
    assert_eq!(active.start_height.get(), 100);

    db.store.fail_ticket(CHAIN_ID).await.unwrap();
    assert!(db.store.active_ticket(CHAIN_ID).await.unwrap().is_none());
}

#[tokio::test]
async fn rewind_to_deletes_versioned_rows_at_or_past_fork_height_and_resets_cursor() {
    let db = TestDb::new().await;

    db.store
        .set_cursor(CHAIN_ID, BlockCursor { height: 110.into(), hash: BlockHash::new([110u8; 32]), parent_hash: BlockHash::new([109u8; 32]) })
        .await
        .unwrap();

    projection_fixtures::insert_proof_set(&db.pool, "1", "0x1111111111111111111111111111111111111111", 100, "0xaa").await;
    projection_fixtures::insert_proof_set(&db.pool, "2", "0x2222222222222222222222222222222222222222", 105, "0xbb").await;
    projection_fixtures::insert_root(&db.pool, "1", 1, "0xcid1", 100, "0xaa").await;
    projection_fixtures::insert_fault_record(&db.pool, "1", "7", &["1".into()], 108, "0xcc").await;

    let ticket = ReorgTicket::new(105.into(), chrono::Utc::now());
    db.store.create_ticket(CHAIN_ID, &ticket).await.unwrap();

    db.store.rewind_to(CHAIN_ID, 105.into(), BlockHash::new([99u8; 32]), BlockHash::new([98u8; 32])).await.unwrap();

    assert_eq!(projection_fixtures::row_count(&db.pool, "proof_sets").await, 1);
    assert_eq!(projection_fixtures::row_count(&db.pool, "roots").await, 1);
    assert_eq!(projection_fixtures::row_count(&db.pool, "fault_records").await, 0);

    let cursor = db.store.get_cursor(CHAIN_ID).await.unwrap().unwrap();
    assert_eq!(cursor.height.get(), 104);
    assert_eq!(cursor.hash, BlockHash::new([99u8; 32]));

    assert!(db.store.active_ticket(CHAIN_ID).await.unwrap().is_none());
}
