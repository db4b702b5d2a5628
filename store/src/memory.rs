use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use model::{Aggregate, LastPointer, Metadata, Sample, SampleId, TransactionCountSnapshot};

use super::RecordStore;

#[derive(Default)]
struct Tables {
    metadata: Option<Metadata>,
    last_pointer: Option<LastPointer>,
    samples: BTreeMap<SampleId, Sample>,
    aggregates: BTreeMap<SampleId, Aggregate>,
    snapshots: BTreeMap<u64, TransactionCountSnapshot>,
}

/// In-process store with the same upsert semantics as the SQLite store.
/// Used for dry runs and tests.
#[derive(Default, Clone)]
pub struct MemoryRecordStore {
    tables: Arc<Mutex<Tables>>,
    writes: Arc<AtomicU64>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `save_*` calls served so far.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    pub async fn snapshot_count(&self) -> usize {
        self.tables.lock().await.snapshots.len()
    }

    /// Test convenience: drop a sample to simulate a corrupted chain.
    pub async fn remove_sample(&self, id: SampleId) -> Option<Sample> {
        self.tables.lock().await.samples.remove(&id)
    }

    /// Test convenience: drop an aggregate to simulate a corrupted chain.
    pub async fn remove_aggregate(&self, id: SampleId) -> Option<Aggregate> {
        self.tables.lock().await.aggregates.remove(&id)
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn load_metadata(&self) -> anyhow::Result<Option<Metadata>> {
        Ok(self.tables.lock().await.metadata.clone())
    }

    async fn save_metadata(&self, metadata: &Metadata) -> anyhow::Result<()> {
        self.tables.lock().await.metadata = Some(metadata.clone());
        self.record_write();
        Ok(())
    }

    async fn load_sample(&self, id: SampleId) -> anyhow::Result<Option<Sample>> {
        Ok(self.tables.lock().await.samples.get(&id).cloned())
    }

    async fn save_sample(&self, sample: &Sample) -> anyhow::Result<()> {
        self.tables
            .lock()
            .await
            .samples
            .insert(sample.id, sample.clone());
        self.record_write();
        Ok(())
    }

    async fn load_aggregate(&self, id: SampleId) -> anyhow::Result<Option<Aggregate>> {
        Ok(self.tables.lock().await.aggregates.get(&id).cloned())
    }

    async fn save_aggregate(&self, aggregate: &Aggregate) -> anyhow::Result<()> {
        self.tables
            .lock()
            .await
            .aggregates
            .insert(aggregate.id, aggregate.clone());
        self.record_write();
        Ok(())
    }

    async fn load_last_pointer(&self) -> anyhow::Result<Option<LastPointer>> {
        Ok(self.tables.lock().await.last_pointer)
    }

    async fn save_last_pointer(&self, pointer: &LastPointer) -> anyhow::Result<()> {
        self.tables.lock().await.last_pointer = Some(*pointer);
        self.record_write();
        Ok(())
    }

    async fn load_snapshot(
        &self,
        timestamp: u64,
    ) -> anyhow::Result<Option<TransactionCountSnapshot>> {
        Ok(self.tables.lock().await.snapshots.get(&timestamp).cloned())
    }

    async fn save_snapshot(&self, snapshot: &TransactionCountSnapshot) -> anyhow::Result<()> {
        self.tables
            .lock()
            .await
            .snapshots
            .insert(snapshot.timestamp, snapshot.clone());
        self.record_write();
        Ok(())
    }

    async fn list_samples(&self) -> anyhow::Result<Vec<Sample>> {
        Ok(self.tables.lock().await.samples.values().cloned().collect())
    }

    async fn list_aggregates(&self) -> anyhow::Result<Vec<Aggregate>> {
        Ok(self
            .tables
            .lock()
            .await
            .aggregates
            .values()
            .cloned()
            .collect())
    }
}
