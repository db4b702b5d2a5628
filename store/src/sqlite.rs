//! SqliteRecordStore
//! -----------------
//! SQLite-backed implementation of `RecordStore`. It makes the accumulation
//! chain durable so that:
//!
//!  - an indexer restart resumes the fold from the persisted `LastPointer`
//!  - samples and aggregates stay queryable by downstream readers
//!  - id allocation and transaction counting survive restarts
//!
//! Arbitrary-precision integers are stored as decimal TEXT; ids, timestamps
//! and block heights as INTEGER (checked conversion from `u64`).
use std::str::FromStr;

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use num_bigint::BigInt;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tracing::{debug, instrument};

use model::{
    Address, Aggregate, LastPointer, Metadata, Sample, SampleId, TransactionCountSnapshot,
};

use super::RecordStore;

/// SQLite-based persistence backend for accumulator records.
///
/// Provides:
///
///   - schema creation on startup (`migrate`)
///   - upsert semantics for every `save_*`
///   - ordered listing of samples and aggregates
pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    /// Wrap an existing pool. The caller is responsible for `migrate()`.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect (creating the database file if needed) and ensure the schema.
    pub async fn new(url: &str) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .with_context(|| format!("invalid sqlite url {url}"))?
            .create_if_missing(true);

        // A single connection keeps `sqlite::memory:` databases alive and
        // serializes writes, which matches the one-observation-at-a-time model.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .with_context(|| format!("failed to open sqlite database {url}"))?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Creates every table if it does not exist.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
CREATE TABLE IF NOT EXISTS metadata (
  key TEXT PRIMARY KEY,
  next_sample_id INTEGER NOT NULL,
  transaction_count INTEGER NOT NULL
);
"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
CREATE TABLE IF NOT EXISTS samples (
  id INTEGER PRIMARY KEY,
  timestamp INTEGER NOT NULL,
  block_height INTEGER NOT NULL,
  raw_reserve_a TEXT NOT NULL,
  price_a_to_b TEXT NOT NULL,
  price_b_to_c TEXT NOT NULL,
  price_composite TEXT NOT NULL,
  source TEXT NOT NULL
);
"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
CREATE TABLE IF NOT EXISTS aggregates (
  id INTEGER PRIMARY KEY,
  numerator TEXT NOT NULL,
  denominator TEXT NOT NULL,
  timestamp INTEGER NOT NULL,
  block_height INTEGER NOT NULL,
  source TEXT NOT NULL
);
"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
CREATE TABLE IF NOT EXISTS last_pointer (
  key TEXT PRIMARY KEY,
  last_sample_id INTEGER NOT NULL,
  last_aggregate_id INTEGER NOT NULL
);
"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
CREATE TABLE IF NOT EXISTS transaction_count_snapshots (
  timestamp INTEGER PRIMARY KEY,
  block_height INTEGER NOT NULL,
  count INTEGER NOT NULL
);
"#,
        )
        .execute(&self.pool)
        .await?;

        debug!("sqlite schema ensured");
        Ok(())
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn load_metadata(&self) -> anyhow::Result<Option<Metadata>> {
        let row = sqlx::query(
            "SELECT next_sample_id, transaction_count FROM metadata WHERE key = ?",
        )
        .bind(Metadata::KEY)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| -> anyhow::Result<Metadata> {
            Ok(Metadata {
                next_sample_id: i64_to_u64(r.get("next_sample_id"), "next_sample_id")?,
                transaction_count: i64_to_u64(r.get("transaction_count"), "transaction_count")?,
            })
        })
        .transpose()
    }

    async fn save_metadata(&self, metadata: &Metadata) -> anyhow::Result<()> {
        sqlx::query(
            r#"
INSERT INTO metadata (key, next_sample_id, transaction_count)
VALUES (?, ?, ?)
ON CONFLICT(key) DO UPDATE SET
  next_sample_id = excluded.next_sample_id,
  transaction_count = excluded.transaction_count;
"#,
        )
        .bind(Metadata::KEY)
        .bind(u64_to_i64(metadata.next_sample_id)?)
        .bind(u64_to_i64(metadata.transaction_count)?)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[instrument(skip(self), level = "trace")]
    async fn load_sample(&self, id: SampleId) -> anyhow::Result<Option<Sample>> {
        let row = sqlx::query("SELECT * FROM samples WHERE id = ?")
            .bind(u64_to_i64(id)?)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_sample).transpose()
    }

    async fn save_sample(&self, sample: &Sample) -> anyhow::Result<()> {
        sqlx::query(
            r#"
INSERT INTO samples (
  id, timestamp, block_height,
  raw_reserve_a, price_a_to_b, price_b_to_c, price_composite,
  source
)
VALUES (?, ?, ?, ?, ?, ?, ?, ?)
ON CONFLICT(id) DO UPDATE SET
  timestamp = excluded.timestamp,
  block_height = excluded.block_height,
  raw_reserve_a = excluded.raw_reserve_a,
  price_a_to_b = excluded.price_a_to_b,
  price_b_to_c = excluded.price_b_to_c,
  price_composite = excluded.price_composite,
  source = excluded.source;
"#,
        )
        .bind(u64_to_i64(sample.id)?)
        .bind(u64_to_i64(sample.timestamp)?)
        .bind(u64_to_i64(sample.block_height)?)
        .bind(sample.raw_reserve_a.to_string())
        .bind(sample.price_a_to_b.to_string())
        .bind(sample.price_b_to_c.to_string())
        .bind(sample.price_composite.to_string())
        .bind(sample.source.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[instrument(skip(self), level = "trace")]
    async fn load_aggregate(&self, id: SampleId) -> anyhow::Result<Option<Aggregate>> {
        let row = sqlx::query("SELECT * FROM aggregates WHERE id = ?")
            .bind(u64_to_i64(id)?)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_aggregate).transpose()
    }

    async fn save_aggregate(&self, aggregate: &Aggregate) -> anyhow::Result<()> {
        sqlx::query(
            r#"
INSERT INTO aggregates (id, numerator, denominator, timestamp, block_height, source)
VALUES (?, ?, ?, ?, ?, ?)
ON CONFLICT(id) DO UPDATE SET
  numerator = excluded.numerator,
  denominator = excluded.denominator,
  timestamp = excluded.timestamp,
  block_height = excluded.block_height,
  source = excluded.source;
"#,
        )
        .bind(u64_to_i64(aggregate.id)?)
        .bind(aggregate.numerator.to_string())
        .bind(aggregate.denominator.to_string())
        .bind(u64_to_i64(aggregate.timestamp)?)
        .bind(u64_to_i64(aggregate.block_height)?)
        .bind(aggregate.source.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn load_last_pointer(&self) -> anyhow::Result<Option<LastPointer>> {
        let row = sqlx::query(
            "SELECT last_sample_id, last_aggregate_id FROM last_pointer WHERE key = ?",
        )
        .bind(LastPointer::KEY)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| -> anyhow::Result<LastPointer> {
            Ok(LastPointer {
                last_sample_id: i64_to_u64(r.get("last_sample_id"), "last_sample_id")?,
                last_aggregate_id: i64_to_u64(r.get("last_aggregate_id"), "last_aggregate_id")?,
            })
        })
        .transpose()
    }

    async fn save_last_pointer(&self, pointer: &LastPointer) -> anyhow::Result<()> {
        sqlx::query(
            r#"
INSERT INTO last_pointer (key, last_sample_id, last_aggregate_id)
VALUES (?, ?, ?)
ON CONFLICT(key) DO UPDATE SET
  last_sample_id = excluded.last_sample_id,
  last_aggregate_id = excluded.last_aggregate_id;
"#,
        )
        .bind(LastPointer::KEY)
        .bind(u64_to_i64(pointer.last_sample_id)?)
        .bind(u64_to_i64(pointer.last_aggregate_id)?)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn load_snapshot(
        &self,
        timestamp: u64,
    ) -> anyhow::Result<Option<TransactionCountSnapshot>> {
        let row = sqlx::query(
            "SELECT timestamp, block_height, count FROM transaction_count_snapshots WHERE timestamp = ?",
        )
        .bind(u64_to_i64(timestamp)?)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| -> anyhow::Result<TransactionCountSnapshot> {
            Ok(TransactionCountSnapshot {
                timestamp: i64_to_u64(r.get("timestamp"), "timestamp")?,
                block_height: i64_to_u64(r.get("block_height"), "block_height")?,
                count: i64_to_u64(r.get("count"), "count")?,
            })
        })
        .transpose()
    }

    async fn save_snapshot(&self, snapshot: &TransactionCountSnapshot) -> anyhow::Result<()> {
        sqlx::query(
            r#"
INSERT INTO transaction_count_snapshots (timestamp, block_height, count)
VALUES (?, ?, ?)
ON CONFLICT(timestamp) DO UPDATE SET
  block_height = excluded.block_height,
  count = excluded.count;
"#,
        )
        .bind(u64_to_i64(snapshot.timestamp)?)
        .bind(u64_to_i64(snapshot.block_height)?)
        .bind(u64_to_i64(snapshot.count)?)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_samples(&self) -> anyhow::Result<Vec<Sample>> {
        let rows = sqlx::query("SELECT * FROM samples ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_sample).collect()
    }

    async fn list_aggregates(&self) -> anyhow::Result<Vec<Aggregate>> {
        let rows = sqlx::query("SELECT * FROM aggregates ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_aggregate).collect()
    }
}

/* =========================
Row mapping + conversions
========================= */

fn row_to_sample(r: &SqliteRow) -> anyhow::Result<Sample> {
    Ok(Sample {
        id: i64_to_u64(r.get("id"), "id")?,
        timestamp: i64_to_u64(r.get("timestamp"), "timestamp")?,
        block_height: i64_to_u64(r.get("block_height"), "block_height")?,
        raw_reserve_a: parse_big(r.get("raw_reserve_a"), "raw_reserve_a")?,
        price_a_to_b: parse_big(r.get("price_a_to_b"), "price_a_to_b")?,
        price_b_to_c: parse_big(r.get("price_b_to_c"), "price_b_to_c")?,
        price_composite: parse_big(r.get("price_composite"), "price_composite")?,
        source: parse_address(r.get("source"))?,
    })
}

fn row_to_aggregate(r: &SqliteRow) -> anyhow::Result<Aggregate> {
    Ok(Aggregate {
        id: i64_to_u64(r.get("id"), "id")?,
        numerator: parse_big(r.get("numerator"), "numerator")?,
        denominator: parse_big(r.get("denominator"), "denominator")?,
        timestamp: i64_to_u64(r.get("timestamp"), "timestamp")?,
        block_height: i64_to_u64(r.get("block_height"), "block_height")?,
        source: parse_address(r.get("source"))?,
    })
}

fn parse_big(v: String, field: &'static str) -> anyhow::Result<BigInt> {
    BigInt::from_str(&v).with_context(|| format!("invalid integer in {field}: {v}"))
}

fn parse_address(v: String) -> anyhow::Result<Address> {
    v.parse::<Address>()
        .with_context(|| format!("invalid address in source: {v}"))
}

fn i64_to_u64(v: i64, field: &'static str) -> anyhow::Result<u64> {
    u64::try_from(v).map_err(|_| anyhow!("negative value {v} in {field}"))
}

fn u64_to_i64(v: u64) -> anyhow::Result<i64> {
    i64::try_from(v).map_err(|_| anyhow!("value {v} exceeds sqlite INTEGER range"))
}
