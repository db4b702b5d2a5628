//! Weighted-Average Updater
//!
//! Two states, discriminated only by whether a `LastPointer` exists:
//!
//! - **Uninitialized**: the first sample gets a zero seed aggregate and the
//!   pointer is created. No weighting happens.
//! - **Running**: the previous sample/aggregate are resolved through the
//!   pointer and the new aggregate is
//!
//! ```text
//! w           = |Δtimestamp|            (time mode)
//!             | |Δraw_reserve_a|        (volume mode)
//! numerator   = prev.numerator   + prev_sample.price_composite * w
//! denominator = prev.denominator + w
//! ```
//!
//! The price weighted is the *previous* sample's: it was in effect for the
//! interval that just closed. A zero weight is legal and leaves the sums
//! unchanged.
//!
//! The average itself (`numerator / denominator`) is a read-side concern and
//! is not computed here.

use std::sync::Arc;

use num_bigint::BigInt;
use num_traits::{Signed, Zero};
use tracing::{debug, info, warn};

use model::{Aggregate, AveragingMode, LastPointer, Sample};
use store::RecordStore;

use crate::error::{AccumulatorError, RecordKind};
use crate::registry::LastPointerRegistry;
use crate::Result;

/// Resolved head of the accumulation chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChainHead {
    Uninitialized,
    Running {
        pointer: LastPointer,
        prev_sample: Sample,
        prev_aggregate: Aggregate,
    },
}

/// Non-negative weight of the interval between `prev` and `next`.
pub fn weight(mode: AveragingMode, prev: &Sample, next: &Sample) -> BigInt {
    match mode {
        AveragingMode::Time => BigInt::from(next.timestamp.abs_diff(prev.timestamp)),
        AveragingMode::Volume => (&next.raw_reserve_a - &prev.raw_reserve_a).abs(),
    }
}

/// Folds `next` into the chain after `prev_aggregate`.
pub fn fold(
    mode: AveragingMode,
    prev_sample: &Sample,
    prev_aggregate: &Aggregate,
    next: &Sample,
) -> Aggregate {
    let w = weight(mode, prev_sample, next);

    Aggregate {
        id: next.id,
        numerator: &prev_aggregate.numerator + &prev_sample.price_composite * &w,
        denominator: &prev_aggregate.denominator + &w,
        timestamp: next.timestamp,
        block_height: next.block_height,
        source: next.source,
    }
}

pub struct WeightedAverageUpdater<S: RecordStore> {
    store: Arc<S>,
    registry: LastPointerRegistry<S>,
    mode: AveragingMode,
}

impl<S: RecordStore> WeightedAverageUpdater<S> {
    pub fn new(store: Arc<S>, mode: AveragingMode) -> Self {
        Self {
            registry: LastPointerRegistry::new(store.clone()),
            store,
            mode,
        }
    }

    pub fn mode(&self) -> AveragingMode {
        self.mode
    }

    /// Loads the pointer and the two records it references. A dangling
    /// pointer is a `StateCorruption` error, never a reason to bootstrap.
    pub async fn chain_head(&self) -> Result<ChainHead> {
        let Some(pointer) = self.registry.load().await? else {
            return Ok(ChainHead::Uninitialized);
        };

        let prev_sample = self
            .store
            .load_sample(pointer.last_sample_id)
            .await?
            .ok_or(AccumulatorError::StateCorruption {
                kind: RecordKind::Sample,
                id: pointer.last_sample_id,
            })?;

        let prev_aggregate = self
            .store
            .load_aggregate(pointer.last_aggregate_id)
            .await?
            .ok_or(AccumulatorError::StateCorruption {
                kind: RecordKind::Aggregate,
                id: pointer.last_aggregate_id,
            })?;

        Ok(ChainHead::Running {
            pointer,
            prev_sample,
            prev_aggregate,
        })
    }

    /// Writes the new aggregate, then moves the pointer onto it. `sample`
    /// must already be persisted.
    pub async fn apply(&self, head: ChainHead, sample: &Sample) -> Result<Aggregate> {
        let aggregate = match head {
            ChainHead::Uninitialized => {
                let seed = Aggregate::bootstrap(sample);
                info!(
                    sample_id = sample.id,
                    timestamp = sample.timestamp,
                    "bootstrapping accumulation chain"
                );
                seed
            }
            ChainHead::Running {
                pointer,
                prev_sample,
                prev_aggregate,
            } => {
                if sample.timestamp < prev_sample.timestamp {
                    warn!(
                        prev_timestamp = prev_sample.timestamp,
                        timestamp = sample.timestamp,
                        "observation timestamp went backwards"
                    );
                }

                let next = fold(self.mode, &prev_sample, &prev_aggregate, sample);
                let w = &next.denominator - &prev_aggregate.denominator;

                if w.is_zero() {
                    debug!(
                        sample_id = sample.id,
                        prev_sample_id = pointer.last_sample_id,
                        "zero-weight interval; sums carried forward"
                    );
                } else {
                    debug!(
                        sample_id = sample.id,
                        prev_aggregate_id = pointer.last_aggregate_id,
                        mode = %self.mode,
                        weight = %w,
                        numerator = %next.numerator,
                        denominator = %next.denominator,
                        "aggregate folded"
                    );
                }
                next
            }
        };

        self.store.save_aggregate(&aggregate).await?;
        self.registry
            .save(&LastPointer::new(sample, &aggregate))
            .await?;

        Ok(aggregate)
    }

    /// Resolve the head and apply in one step.
    pub async fn update(&self, sample: &Sample) -> Result<Aggregate> {
        let head = self.chain_head().await?;
        self.apply(head, sample).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::{Address, SCALE_18};
    use proptest::prelude::*;

    fn sample(id: u64, timestamp: u64, reserve: i64, price: i64) -> Sample {
        Sample {
            id,
            timestamp,
            block_height: id,
            raw_reserve_a: BigInt::from(reserve),
            price_a_to_b: BigInt::zero(),
            price_b_to_c: BigInt::zero(),
            price_composite: BigInt::from(price),
            source: Address::from_bytes([7; 20]),
        }
    }

    #[test]
    fn time_weight_is_plain_elapsed_time() {
        let a = sample(1, 100, 0, 0);
        let b = sample(50, 160, 0, 0);

        // No scaling by the new sample's id.
        assert_eq!(weight(AveragingMode::Time, &a, &b), BigInt::from(60));
        assert_eq!(weight(AveragingMode::Time, &b, &a), BigInt::from(60));
    }

    #[test]
    fn volume_weight_is_absolute_reserve_delta() {
        let a = sample(1, 100, 5_000, 0);
        let b = sample(2, 100, 3_500, 0);

        assert_eq!(weight(AveragingMode::Volume, &a, &b), BigInt::from(1_500));
    }

    #[test]
    fn fold_weights_previous_price() {
        let six = BigInt::from(6u64 * SCALE_18);
        let mut prev = sample(1, 100, 0, 0);
        prev.price_composite = six.clone();
        let mut next = sample(2, 160, 0, 0);
        next.price_composite = BigInt::from(9u64 * SCALE_18);

        let seed = Aggregate::bootstrap(&prev);
        let agg = fold(AveragingMode::Time, &prev, &seed, &next);

        assert_eq!(agg.id, 2);
        assert_eq!(agg.numerator, &six * BigInt::from(60));
        assert_eq!(agg.denominator, BigInt::from(60));
        assert_eq!(&agg.numerator / &agg.denominator, six);
    }

    #[test]
    fn zero_weight_leaves_sums_unchanged() {
        let prev = sample(1, 100, 10, 42);
        let next = sample(2, 100, 10, 99);
        let mut base = Aggregate::bootstrap(&prev);
        base.numerator = BigInt::from(1_234);
        base.denominator = BigInt::from(5);

        let agg = fold(AveragingMode::Time, &prev, &base, &next);
        assert_eq!(agg.numerator, base.numerator);
        assert_eq!(agg.denominator, base.denominator);

        let agg = fold(AveragingMode::Volume, &prev, &base, &next);
        assert_eq!(agg.numerator, base.numerator);
        assert_eq!(agg.denominator, base.denominator);
    }

    proptest! {
        #[test]
        fn fold_adds_exact_deltas(
            t0 in 0u64..1_000_000,
            dt in 0u64..1_000_000,
            r0 in -1_000_000i64..1_000_000,
            r1 in -1_000_000i64..1_000_000,
            price in 0i64..i64::MAX,
            num in 0i64..i64::MAX,
            den in 0i64..i64::MAX,
            volume in any::<bool>(),
        ) {
            let mode = if volume { AveragingMode::Volume } else { AveragingMode::Time };
            let prev = sample(1, t0, r0, price);
            let next = sample(2, t0 + dt, r1, 0);
            let mut base = Aggregate::bootstrap(&prev);
            base.numerator = BigInt::from(num);
            base.denominator = BigInt::from(den);

            let w = weight(mode, &prev, &next);
            let agg = fold(mode, &prev, &base, &next);

            prop_assert!(!w.is_negative());
            prop_assert_eq!(&agg.numerator, &(BigInt::from(num) + BigInt::from(price) * &w));
            prop_assert_eq!(&agg.denominator, &(BigInt::from(den) + &w));
            prop_assert!(agg.denominator >= base.denominator);
            prop_assert!(agg.numerator >= base.numerator);
        }
    }
}
