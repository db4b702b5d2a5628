//! Persisted record kinds.
//!
//! Samples and aggregates are keyed by the decimal string of their sequence
//! id, snapshots by the decimal string of their timestamp. `Metadata` and
//! `LastPointer` are singletons under fixed keys.

use num_bigint::BigInt;
use num_traits::Zero;
use serde::{Deserialize, Serialize};

use crate::Address;

pub type SampleId = u64;

/// One chain event that makes a recompute due. Event kind is irrelevant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    #[serde(alias = "sourceAddress")]
    pub source: Address,
    #[serde(alias = "blockNumber")]
    pub block_height: u64,
    pub timestamp: u64,
}

/// Global counters. Only the sequence allocator and transaction counter
/// mutate this record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub next_sample_id: SampleId,
    pub transaction_count: u64,
}

impl Metadata {
    pub const KEY: &'static str = "metadata";

    pub fn new(start_sample_id: SampleId) -> Self {
        Self {
            next_sample_id: start_sample_id,
            transaction_count: 0,
        }
    }
}

/// Immutable price observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub id: SampleId,
    pub timestamp: u64,
    pub block_height: u64,
    /// reserve0 of the pool, kept for volume weighting.
    pub raw_reserve_a: BigInt,
    /// reserve0 / reserve1, scaled by 10^18.
    pub price_a_to_b: BigInt,
    /// Oracle answer lifted to 18 decimals.
    pub price_b_to_c: BigInt,
    /// price_a_to_b * price_b_to_c / 10^18.
    pub price_composite: BigInt,
    pub source: Address,
}

impl Sample {
    pub fn key(&self) -> String {
        self.id.to_string()
    }
}

/// One node of the accumulation chain: cumulative weighted price sum and
/// cumulative weight up to and including the sample with the same id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregate {
    pub id: SampleId,
    pub numerator: BigInt,
    pub denominator: BigInt,
    pub timestamp: u64,
    pub block_height: u64,
    pub source: Address,
}

impl Aggregate {
    /// Zero seed written alongside the very first sample.
    pub fn bootstrap(sample: &Sample) -> Self {
        Self {
            id: sample.id,
            numerator: BigInt::zero(),
            denominator: BigInt::zero(),
            timestamp: sample.timestamp,
            block_height: sample.block_height,
            source: sample.source,
        }
    }

    pub fn key(&self) -> String {
        self.id.to_string()
    }
}

/// Cursor to the most recent sample/aggregate pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastPointer {
    pub last_sample_id: SampleId,
    pub last_aggregate_id: SampleId,
}

impl LastPointer {
    pub const KEY: &'static str = "twapdata";

    pub fn new(sample: &Sample, aggregate: &Aggregate) -> Self {
        Self {
            last_sample_id: sample.id,
            last_aggregate_id: aggregate.id,
        }
    }
}

/// Value of the global transaction count as of a given timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionCountSnapshot {
    pub timestamp: u64,
    pub block_height: u64,
    pub count: u64,
}

impl TransactionCountSnapshot {
    pub fn key(&self) -> String {
        self.timestamp.to_string()
    }
}
