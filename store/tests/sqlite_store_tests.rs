use std::str::FromStr;

use num_bigint::BigInt;

use model::{Address, Aggregate, LastPointer, Metadata, Sample, TransactionCountSnapshot};
use store::{MemoryRecordStore, RecordStore, SqliteRecordStore};

///
/// Test suite for the record stores
///
/// This suite verifies:
///   · schema migration on connect
///   · upsert semantics for singletons and keyed records
///   · lossless big-integer persistence (beyond i64/u128 range)
///   · ordered listing
///   · identical behavior of the in-memory store
///
async fn sqlite_store() -> SqliteRecordStore {
    SqliteRecordStore::new("sqlite::memory:")
        .await
        .expect("open in-memory sqlite store")
}

fn pool_address() -> Address {
    "0xaF918eF5b9f33231764A5557881E6D3e5277d456"
        .parse()
        .unwrap()
}

fn sample(id: u64, timestamp: u64) -> Sample {
    Sample {
        id,
        timestamp,
        block_height: id.wrapping_add(1_000),
        raw_reserve_a: BigInt::from_str("2000000000000000000000").unwrap(),
        price_a_to_b: BigInt::from_str("2000000000000000000").unwrap(),
        price_b_to_c: BigInt::from_str("3000000000000000000").unwrap(),
        price_composite: BigInt::from_str("6000000000000000000").unwrap(),
        source: pool_address(),
    }
}

#[tokio::test]
async fn empty_store_has_no_singletons() -> anyhow::Result<()> {
    let store = sqlite_store().await;

    assert!(store.load_metadata().await?.is_none());
    assert!(store.load_last_pointer().await?.is_none());
    assert!(store.load_sample(1).await?.is_none());
    assert!(store.load_aggregate(1).await?.is_none());
    assert!(store.load_snapshot(100).await?.is_none());

    Ok(())
}

#[tokio::test]
async fn metadata_upsert_overwrites_singleton() -> anyhow::Result<()> {
    let store = sqlite_store().await;

    store.save_metadata(&Metadata::new(1)).await?;
    store
        .save_metadata(&Metadata {
            next_sample_id: 5,
            transaction_count: 4,
        })
        .await?;

    let m = store.load_metadata().await?.expect("metadata present");
    assert_eq!(m.next_sample_id, 5);
    assert_eq!(m.transaction_count, 4);

    Ok(())
}

#[tokio::test]
async fn sample_round_trip_keeps_big_integers() -> anyhow::Result<()> {
    let store = sqlite_store().await;

    let mut s = sample(1, 100);
    // Larger than u128::MAX
    s.price_composite = BigInt::from_str("987654321098765432109876543210987654321098").unwrap();

    store.save_sample(&s).await?;

    let loaded = store.load_sample(1).await?.expect("sample present");
    assert_eq!(loaded, s);

    Ok(())
}

#[tokio::test]
async fn aggregate_and_pointer_persist() -> anyhow::Result<()> {
    let store = sqlite_store().await;

    let s = sample(3, 160);
    let mut agg = Aggregate::bootstrap(&s);
    agg.numerator = BigInt::from_str("360000000000000000000").unwrap();
    agg.denominator = BigInt::from(60);

    store.save_aggregate(&agg).await?;
    store.save_last_pointer(&LastPointer::new(&s, &agg)).await?;

    assert_eq!(store.load_aggregate(3).await?, Some(agg));

    let ptr = store.load_last_pointer().await?.expect("pointer present");
    assert_eq!(ptr.last_sample_id, 3);
    assert_eq!(ptr.last_aggregate_id, 3);

    Ok(())
}

#[tokio::test]
async fn snapshot_is_keyed_by_timestamp() -> anyhow::Result<()> {
    let store = sqlite_store().await;

    store
        .save_snapshot(&TransactionCountSnapshot {
            timestamp: 100,
            block_height: 10,
            count: 1,
        })
        .await?;
    store
        .save_snapshot(&TransactionCountSnapshot {
            timestamp: 100,
            block_height: 11,
            count: 2,
        })
        .await?;

    let snap = store.load_snapshot(100).await?.expect("snapshot present");
    assert_eq!(snap.count, 2);
    assert_eq!(snap.block_height, 11);

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM transaction_count_snapshots")
        .fetch_one(store.pool())
        .await?;
    assert_eq!(rows, 1);

    Ok(())
}

#[tokio::test]
async fn listing_is_ordered_by_id() -> anyhow::Result<()> {
    let store = sqlite_store().await;

    for id in [3, 1, 2] {
        let s = sample(id, id * 10);
        store.save_sample(&s).await?;
        store.save_aggregate(&Aggregate::bootstrap(&s)).await?;
    }

    let sample_ids: Vec<u64> = store.list_samples().await?.iter().map(|s| s.id).collect();
    let agg_ids: Vec<u64> = store.list_aggregates().await?.iter().map(|a| a.id).collect();

    assert_eq!(sample_ids, vec![1, 2, 3]);
    assert_eq!(agg_ids, vec![1, 2, 3]);

    Ok(())
}

#[tokio::test]
async fn ids_beyond_sqlite_range_are_rejected() {
    let store = sqlite_store().await;

    let s = sample(u64::MAX, 1);
    let err = store.save_sample(&s).await.unwrap_err();

    assert!(err.to_string().contains("exceeds sqlite INTEGER range"));
}

#[tokio::test]
async fn memory_store_matches_sqlite_semantics() -> anyhow::Result<()> {
    let store = MemoryRecordStore::new();

    store.save_sample(&sample(2, 20)).await?;
    store.save_sample(&sample(1, 10)).await?;
    store
        .save_snapshot(&TransactionCountSnapshot {
            timestamp: 10,
            block_height: 1,
            count: 1,
        })
        .await?;
    store
        .save_snapshot(&TransactionCountSnapshot {
            timestamp: 10,
            block_height: 1,
            count: 2,
        })
        .await?;

    let ids: Vec<u64> = store.list_samples().await?.iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![1, 2]);
    assert_eq!(store.snapshot_count().await, 1);
    assert_eq!(store.load_snapshot(10).await?.map(|s| s.count), Some(2));
    assert_eq!(store.write_count(), 4);

    Ok(())
}
