//! Price Sample Builder
//!
//! Chains two exchange rates into one fixed-point composite price:
//!
//! ```text
//! price_a_to_b    = reserve0 * 10^18 / reserve1
//! price_b_to_c    = latest_answer * 10^10        (8 → 18 decimals)
//! price_composite = price_a_to_b * price_b_to_c / 10^18
//! ```
//!
//! All divisions truncate. A zero `reserve1` fails the observation with
//! `ArithmeticError::DivisionByZero` before anything is written.

use std::sync::Arc;

use num_bigint::{BigInt, BigUint};
use tracing::{debug, instrument};

use model::{
    Address, ArithmeticError, Observation, SCALE_10, SCALE_18, Sample, SampleId, checked_div,
};
use sources::{OracleFeedSource, PoolReserveSource};
use store::RecordStore;

use crate::Result;

/// Price fields of a sample, before it is assigned an id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DerivedPrices {
    pub raw_reserve_a: BigInt,
    pub price_a_to_b: BigInt,
    pub price_b_to_c: BigInt,
    pub price_composite: BigInt,
}

/// Pure derivation of the composite price from raw source values.
pub fn derive_prices(
    reserve0: &BigUint,
    reserve1: &BigUint,
    latest_answer: &BigInt,
) -> std::result::Result<DerivedPrices, ArithmeticError> {
    let scale_18 = BigInt::from(SCALE_18);
    let reserve0 = BigInt::from(reserve0.clone());
    let reserve1 = BigInt::from(reserve1.clone());

    let price_a_to_b = checked_div(&(&reserve0 * &scale_18), &reserve1, "priceAtoB")?;
    let price_b_to_c = latest_answer * BigInt::from(SCALE_10);
    let price_composite = checked_div(
        &(&price_a_to_b * &price_b_to_c),
        &scale_18,
        "priceComposite",
    )?;

    Ok(DerivedPrices {
        raw_reserve_a: reserve0,
        price_a_to_b,
        price_b_to_c,
        price_composite,
    })
}

pub struct PriceSampleBuilder<S: RecordStore> {
    store: Arc<S>,
    reserves: Arc<dyn PoolReserveSource>,
    oracle: Arc<dyn OracleFeedSource>,
    oracle_feed: Address,
}

impl<S: RecordStore> PriceSampleBuilder<S> {
    pub fn new(
        store: Arc<S>,
        reserves: Arc<dyn PoolReserveSource>,
        oracle: Arc<dyn OracleFeedSource>,
        oracle_feed: Address,
    ) -> Self {
        Self {
            store,
            reserves,
            oracle,
            oracle_feed,
        }
    }

    /// Reads both sources at the observation's block and derives prices.
    /// Performs no writes.
    #[instrument(skip(self, observation), fields(source = %observation.source), level = "debug")]
    pub async fn quote(&self, observation: &Observation) -> Result<DerivedPrices> {
        let (reserve0, reserve1) = self
            .reserves
            .get_reserves(&observation.source, observation.block_height)
            .await?;

        let answer = self
            .oracle
            .latest_answer(&self.oracle_feed, observation.block_height)
            .await?;

        let prices = derive_prices(&reserve0, &reserve1, &answer)?;

        debug!(
            %reserve0,
            %reserve1,
            %answer,
            price_composite = %prices.price_composite,
            "prices derived"
        );
        Ok(prices)
    }

    pub fn assemble(id: SampleId, observation: &Observation, prices: DerivedPrices) -> Sample {
        Sample {
            id,
            timestamp: observation.timestamp,
            block_height: observation.block_height,
            raw_reserve_a: prices.raw_reserve_a,
            price_a_to_b: prices.price_a_to_b,
            price_b_to_c: prices.price_b_to_c,
            price_composite: prices.price_composite,
            source: observation.source,
        }
    }

    pub async fn persist(&self, sample: &Sample) -> Result<()> {
        Ok(self.store.save_sample(sample).await?)
    }

    /// Quote, assemble and persist in one step.
    pub async fn build(&self, id: SampleId, observation: &Observation) -> Result<Sample> {
        let prices = self.quote(observation).await?;
        let sample = Self::assemble(id, observation, prices);
        self.persist(&sample).await?;
        Ok(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn e18(v: u64) -> BigUint {
        BigUint::from(v) * BigUint::from(SCALE_18)
    }

    #[test]
    fn derives_composite_price() {
        let prices = derive_prices(&e18(2000), &e18(1000), &BigInt::from(300_000_000)).unwrap();

        assert_eq!(prices.price_a_to_b, BigInt::from(2u64 * SCALE_18));
        assert_eq!(prices.price_b_to_c, BigInt::from(3u64 * SCALE_18));
        assert_eq!(prices.price_composite, BigInt::from(6u64 * SCALE_18));
        assert_eq!(prices.raw_reserve_a, BigInt::from(e18(2000)));
    }

    #[test]
    fn truncates_each_division() {
        // 1e18 / 3 = 333333333333333333 (truncated)
        let prices =
            derive_prices(&BigUint::from(1u8), &BigUint::from(3u8), &BigInt::from(100_000_000))
                .unwrap();

        assert_eq!(prices.price_a_to_b, BigInt::from_str("333333333333333333").unwrap());
        assert_eq!(prices.price_b_to_c, BigInt::from(SCALE_18));
        assert_eq!(prices.price_composite, BigInt::from_str("333333333333333333").unwrap());
    }

    #[test]
    fn negative_feed_answer_propagates_sign() {
        let prices = derive_prices(&e18(1), &e18(1), &BigInt::from(-50_000_000)).unwrap();
        assert_eq!(prices.price_composite, BigInt::from(-500_000_000_000_000_000i64));
    }

    #[test]
    fn zero_second_reserve_is_division_by_zero() {
        let err = derive_prices(&e18(5), &BigUint::from(0u8), &BigInt::from(1)).unwrap_err();
        assert_eq!(err, ArithmeticError::DivisionByZero { context: "priceAtoB" });
    }
}
