//! SnapshotPipeline
//!
//! Runs one observation to completion:
//!
//! 1. allocate the sample id (pre-increment value)
//! 2. quote both price sources and derive prices
//! 3. resolve the chain head through the last pointer
//! 4. increment the global transaction count and snapshot it
//! 5. persist the sample
//! 6. persist the bootstrap or folded aggregate, then the last pointer
//! 7. advance the sequence
//!
//! Steps 2 and 3, plus the check that the sequence can still advance, are the
//! only ones that can fail on bad inputs or corrupted state, and they run
//! before the first write of the observation. A failed
//! observation therefore leaves no sample, aggregate, snapshot or counter
//! change behind. `process` takes `&mut self`, so two observations can never
//! overlap on one pipeline.

use std::sync::Arc;
use std::time::Duration;

use num_bigint::BigInt;
use num_traits::Zero;
use tracing::{Instrument, error, info};

use common::logger::{TraceId, annotate_span, root_span, warn_if_slow};
use model::{Address, Aggregate, ArithmeticError, AveragingMode, Observation, Sample, SampleId};
use sources::{OracleFeedSource, PoolReserveSource};
use store::RecordStore;

use crate::counter::TransactionCounter;
use crate::metadata::MetadataRecord;
use crate::sample_builder::PriceSampleBuilder;
use crate::sequence::SequenceAllocator;
use crate::stats::PipelineStats;
use crate::updater::{ChainHead, WeightedAverageUpdater};
use crate::Result;

#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Time- or volume-weighted folding.
    pub mode: AveragingMode,

    /// `next_sample_id` used when the metadata record is first created.
    pub start_sample_id: SampleId,

    /// Oracle feed contract read for the second exchange rate.
    pub oracle_feed: Address,
}

/// Everything written for one observation.
#[derive(Clone, Debug)]
pub struct ProcessedObservation {
    pub sample: Sample,
    pub aggregate: Aggregate,
    pub transaction_count: u64,
    /// `None` for the bootstrap aggregate.
    pub weight: Option<BigInt>,
}

impl ProcessedObservation {
    pub fn bootstrapped(&self) -> bool {
        self.weight.is_none()
    }
}

pub struct SnapshotPipeline<S: RecordStore> {
    allocator: SequenceAllocator<S>,
    counter: TransactionCounter<S>,
    builder: PriceSampleBuilder<S>,
    updater: WeightedAverageUpdater<S>,
    stats: PipelineStats,
}

impl<S: RecordStore> SnapshotPipeline<S> {
    pub fn new(
        store: Arc<S>,
        reserves: Arc<dyn PoolReserveSource>,
        oracle: Arc<dyn OracleFeedSource>,
        config: PipelineConfig,
    ) -> Self {
        let metadata = Arc::new(MetadataRecord::new(store.clone(), config.start_sample_id));

        Self {
            allocator: SequenceAllocator::new(metadata.clone()),
            counter: TransactionCounter::new(store.clone(), metadata),
            builder: PriceSampleBuilder::new(store.clone(), reserves, oracle, config.oracle_feed),
            updater: WeightedAverageUpdater::new(store, config.mode),
            stats: PipelineStats::default(),
        }
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    pub fn mode(&self) -> AveragingMode {
        self.updater.mode()
    }

    pub async fn process(&mut self, observation: &Observation) -> Result<ProcessedObservation> {
        let trace_id = TraceId::default();
        let span = root_span("process_observation", &trace_id);

        async {
            let out = self.run(observation).await;

            match &out {
                Ok(done) => {
                    PipelineStats::bump(&self.stats.processed);
                    match &done.weight {
                        None => PipelineStats::bump(&self.stats.bootstrapped),
                        Some(w) if w.is_zero() => PipelineStats::bump(&self.stats.zero_weight),
                        Some(_) => {}
                    }
                }
                Err(e) if e.is_fatal() => {
                    PipelineStats::bump(&self.stats.failed_fatal);
                    error!(
                        error = %e,
                        block_height = observation.block_height,
                        "observation failed; chain must halt"
                    );
                }
                Err(e) => {
                    PipelineStats::bump(&self.stats.failed_retryable);
                    error!(
                        error = %e,
                        block_height = observation.block_height,
                        "observation failed"
                    );
                }
            }
            out
        }
        .instrument(span)
        .await
    }

    async fn run(&self, observation: &Observation) -> Result<ProcessedObservation> {
        let id = self.allocator.allocate().await?;
        annotate_span(&observation.source.to_string(), Some(id));

        let prices = warn_if_slow(
            "price_sources",
            Duration::from_millis(500),
            self.builder.quote(observation),
        )
        .await?;

        let head = self.updater.chain_head().await?;
        let prev_denominator = match &head {
            ChainHead::Uninitialized => None,
            ChainHead::Running { prev_aggregate, .. } => Some(prev_aggregate.denominator.clone()),
        };

        // The sequence must be able to advance past this id, or the next
        // observation would reuse it and overwrite what is written below.
        id.checked_add(1).ok_or(ArithmeticError::Overflow {
            context: "nextSampleId",
        })?;

        let transaction_count = self.counter.increment_global_count().await?;
        self.counter
            .snapshot(observation.timestamp, observation.block_height, transaction_count)
            .await?;

        let sample = PriceSampleBuilder::<S>::assemble(id, observation, prices);
        self.builder.persist(&sample).await?;

        let aggregate = self.updater.apply(head, &sample).await?;
        let next_id = self.allocator.advance().await?;

        let weight = prev_denominator.map(|prev| &aggregate.denominator - prev);

        info!(
            sample_id = id,
            next_sample_id = next_id,
            transaction_count,
            timestamp = observation.timestamp,
            price_composite = %sample.price_composite,
            "observation processed"
        );

        Ok(ProcessedObservation {
            sample,
            aggregate,
            transaction_count,
            weight,
        })
    }
}
