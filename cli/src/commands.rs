use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use accumulator::{PipelineConfig, PipelineStats, SnapshotPipeline};
use model::{Observation, checked_div};
use sources::{OracleFeedSource, PoolReserveSource};
use store::RecordStore;

use crate::config::IndexerConfig;

/// Summary of a finished replay.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub processed: u64,
    pub skipped_blank: u64,
}

pub async fn replay<S: RecordStore>(
    store: Arc<S>,
    reserves: Arc<dyn PoolReserveSource>,
    oracle: Arc<dyn OracleFeedSource>,
    config: &IndexerConfig,
    feed: &Path,
) -> anyhow::Result<ReplaySummary> {
    if feed == Path::new("-") {
        let reader = BufReader::new(tokio::io::stdin());
        replay_from(store, reserves, oracle, config, reader).await
    } else {
        let file = tokio::fs::File::open(feed)
            .await
            .with_context(|| format!("opening feed {}", feed.display()))?;
        replay_from(store, reserves, oracle, config, BufReader::new(file)).await
    }
}

/// Processes one JSON observation per line, in order. Stops at the first
/// failure; everything before it stays committed.
pub async fn replay_from<S, R>(
    store: Arc<S>,
    reserves: Arc<dyn PoolReserveSource>,
    oracle: Arc<dyn OracleFeedSource>,
    config: &IndexerConfig,
    reader: R,
) -> anyhow::Result<ReplaySummary>
where
    S: RecordStore,
    R: AsyncBufRead + Unpin,
{
    let mut pipeline = SnapshotPipeline::new(
        store,
        reserves,
        oracle,
        PipelineConfig {
            mode: config.mode,
            start_sample_id: config.start_sample_id,
            oracle_feed: config.oracle_feed,
        },
    );

    let mut summary = ReplaySummary::default();
    let mut lines = reader.lines();
    let mut line_no = 0u64;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        let line = line.trim();
        if line.is_empty() {
            summary.skipped_blank += 1;
            continue;
        }

        let observation: Observation = serde_json::from_str(line)
            .with_context(|| format!("line {line_no}: malformed observation"))?;

        let done = pipeline
            .process(&observation)
            .await
            .with_context(|| format!("line {line_no}: block {}", observation.block_height))?;

        summary.processed += 1;
        if done.bootstrapped() {
            info!(sample_id = done.sample.id, "chain bootstrapped");
        }
    }

    let stats = pipeline.stats();
    info!(
        processed = summary.processed,
        bootstrapped = PipelineStats::get(&stats.bootstrapped),
        zero_weight = PipelineStats::get(&stats.zero_weight),
        mode = %pipeline.mode(),
        "replay finished"
    );

    Ok(summary)
}

pub async fn status<S: RecordStore>(store: &S) -> anyhow::Result<()> {
    let Some(meta) = store.load_metadata().await? else {
        println!("no metadata; nothing has been processed yet");
        return Ok(());
    };
    println!("next sample id     : {}", meta.next_sample_id);
    println!("transaction count  : {}", meta.transaction_count);

    let Some(pointer) = store.load_last_pointer().await? else {
        println!("last pointer       : none");
        return Ok(());
    };
    println!("last sample id     : {}", pointer.last_sample_id);
    println!("last aggregate id  : {}", pointer.last_aggregate_id);

    let Some(aggregate) = store.load_aggregate(pointer.last_aggregate_id).await? else {
        warn!(id = pointer.last_aggregate_id, "last pointer references a missing aggregate");
        anyhow::bail!("aggregate {} is missing", pointer.last_aggregate_id);
    };

    println!("numerator          : {}", aggregate.numerator);
    println!("denominator        : {}", aggregate.denominator);
    match checked_div(&aggregate.numerator, &aggregate.denominator, "average") {
        Ok(avg) => println!("average (1e18)     : {avg}"),
        Err(_) => println!("average (1e18)     : n/a (no weight accumulated)"),
    }
    println!(
        "as of              : block {} at {}",
        aggregate.block_height,
        format_timestamp(aggregate.timestamp)
    );

    Ok(())
}

fn format_timestamp(ts: u64) -> String {
    i64::try_from(ts)
        .ok()
        .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use num_bigint::{BigInt, BigUint};

    use model::{Address, AveragingMode, SCALE_18};
    use sources::SourceError;
    use store::MemoryRecordStore;

    struct FixedMarket;

    #[async_trait]
    impl PoolReserveSource for FixedMarket {
        async fn get_reserves(
            &self,
            _pair: &Address,
            _block_height: u64,
        ) -> Result<(BigUint, BigUint), SourceError> {
            let e18 = BigUint::from(SCALE_18);
            Ok((&e18 * 2_000u32, &e18 * 1_000u32))
        }
    }

    #[async_trait]
    impl OracleFeedSource for FixedMarket {
        async fn latest_answer(&self, _feed: &Address, _block_height: u64) -> Result<BigInt, SourceError> {
            Ok(BigInt::from(300_000_000))
        }
    }

    fn config() -> IndexerConfig {
        IndexerConfig {
            database_url: "sqlite::memory:".into(),
            rpc_url: "http://127.0.0.1:8545".into(),
            oracle_feed: crate::config::DEFAULT_ORACLE_FEED.parse().unwrap(),
            mode: AveragingMode::Time,
            start_sample_id: 1,
            json_logs: false,
        }
    }

    const PAIR: &str = "0xaf918ef5b9f33231764a5557881e6d3e5277d456";

    #[tokio::test]
    async fn replays_ndjson_and_skips_blank_lines() {
        let store = Arc::new(MemoryRecordStore::new());
        let market = Arc::new(FixedMarket);
        let feed = format!(
            "{{\"source\":\"{PAIR}\",\"blockNumber\":10,\"timestamp\":100}}\n\n\
             {{\"sourceAddress\":\"{PAIR}\",\"blockHeight\":11,\"timestamp\":160}}\n"
        );

        let summary = replay_from(store.clone(), market.clone(), market, &config(), feed.as_bytes())
            .await
            .unwrap();

        assert_eq!(
            summary,
            ReplaySummary {
                processed: 2,
                skipped_blank: 1
            }
        );
        let agg = store.load_aggregate(2).await.unwrap().unwrap();
        assert_eq!(agg.denominator, BigInt::from(60));
        assert_eq!(agg.numerator, BigInt::from(360u64) * BigInt::from(SCALE_18));
    }

    #[tokio::test]
    async fn stops_at_first_bad_line() {
        let store = Arc::new(MemoryRecordStore::new());
        let market = Arc::new(FixedMarket);
        let feed = format!(
            "{{\"source\":\"{PAIR}\",\"blockHeight\":10,\"timestamp\":100}}\n\
             not json\n\
             {{\"source\":\"{PAIR}\",\"blockHeight\":12,\"timestamp\":200}}\n"
        );

        let err = replay_from(store.clone(), market.clone(), market, &config(), feed.as_bytes())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("line 2"));
        assert_eq!(store.list_samples().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn status_on_empty_store_is_ok() {
        let store = MemoryRecordStore::new();
        assert!(status(&store).await.is_ok());
    }

    #[test]
    fn timestamps_render_as_rfc3339() {
        assert_eq!(format_timestamp(0), "1970-01-01T00:00:00+00:00");
    }
}
