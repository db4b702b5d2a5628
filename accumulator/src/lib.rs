//! Incremental weighted-average price accumulator.
//!
//! One observation flows through:
//! sequence allocation → transaction count + snapshot → price sample →
//! weighted fold into the running (numerator, denominator) → last pointer →
//! sequence advance. See [`pipeline::SnapshotPipeline`].

pub mod counter;
pub mod error;
pub mod metadata;
pub mod pipeline;
pub mod registry;
pub mod sample_builder;
pub mod sequence;
pub mod stats;
pub mod updater;

pub use counter::TransactionCounter;
pub use error::{AccumulatorError, RecordKind};
pub use pipeline::{PipelineConfig, ProcessedObservation, SnapshotPipeline};
pub use registry::LastPointerRegistry;
pub use sample_builder::{DerivedPrices, PriceSampleBuilder, derive_prices};
pub use sequence::SequenceAllocator;
pub use stats::PipelineStats;
pub use updater::{ChainHead, WeightedAverageUpdater, fold, weight};

pub type Result<T> = std::result::Result<T, AccumulatorError>;
