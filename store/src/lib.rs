pub mod memory;
pub mod sqlite;

pub use memory::MemoryRecordStore;
pub use sqlite::SqliteRecordStore;

use model::{Aggregate, LastPointer, Metadata, Sample, SampleId, TransactionCountSnapshot};

/// Key-value persistence for every record kind the accumulator writes.
///
/// Every `save_*` is an upsert and commits immediately; the accumulator
/// relies on read-your-writes between consecutive calls.
#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    async fn load_metadata(&self) -> anyhow::Result<Option<Metadata>>;
    async fn save_metadata(&self, metadata: &Metadata) -> anyhow::Result<()>;

    async fn load_sample(&self, id: SampleId) -> anyhow::Result<Option<Sample>>;
    async fn save_sample(&self, sample: &Sample) -> anyhow::Result<()>;

    async fn load_aggregate(&self, id: SampleId) -> anyhow::Result<Option<Aggregate>>;
    async fn save_aggregate(&self, aggregate: &Aggregate) -> anyhow::Result<()>;

    async fn load_last_pointer(&self) -> anyhow::Result<Option<LastPointer>>;
    async fn save_last_pointer(&self, pointer: &LastPointer) -> anyhow::Result<()>;

    async fn load_snapshot(&self, timestamp: u64)
    -> anyhow::Result<Option<TransactionCountSnapshot>>;
    async fn save_snapshot(&self, snapshot: &TransactionCountSnapshot) -> anyhow::Result<()>;

    /// All samples, ascending by id.
    async fn list_samples(&self) -> anyhow::Result<Vec<Sample>>;
    /// All aggregates, ascending by id.
    async fn list_aggregates(&self) -> anyhow::Result<Vec<Aggregate>>;
}
