use std::sync::Arc;

use model::{ArithmeticError, TransactionCountSnapshot};
use store::RecordStore;
use tracing::debug;

use crate::Result;
use crate::metadata::MetadataRecord;

/// Global count of processed observations, plus the per-timestamp snapshot
/// table of that count.
pub struct TransactionCounter<S: RecordStore> {
    store: Arc<S>,
    metadata: Arc<MetadataRecord<S>>,
}

impl<S: RecordStore> TransactionCounter<S> {
    pub fn new(store: Arc<S>, metadata: Arc<MetadataRecord<S>>) -> Self {
        Self { store, metadata }
    }

    /// Increments and persists the global count; returns the new value.
    pub async fn increment_global_count(&self) -> Result<u64> {
        let mut metadata = self.metadata.get_or_init().await?;
        metadata.transaction_count = metadata
            .transaction_count
            .checked_add(1)
            .ok_or(ArithmeticError::Overflow {
                context: "transactionCount",
            })?;

        self.metadata.save(&metadata).await?;
        Ok(metadata.transaction_count)
    }

    /// Get-or-create accessor for the snapshot at `timestamp`. A missing
    /// record comes back fresh and unsaved; the key guarantees a later save
    /// lands on the one row for this timestamp.
    pub async fn snapshot_record(&self, timestamp: u64) -> Result<TransactionCountSnapshot> {
        let existing = self.store.load_snapshot(timestamp).await?;

        Ok(existing.unwrap_or(TransactionCountSnapshot {
            timestamp,
            block_height: 0,
            count: 0,
        }))
    }

    /// Overwrites the snapshot for `timestamp` with the given count.
    pub async fn snapshot(
        &self,
        timestamp: u64,
        block_height: u64,
        count: u64,
    ) -> Result<TransactionCountSnapshot> {
        let mut record = self.snapshot_record(timestamp).await?;
        if record.count != 0 {
            debug!(
                timestamp,
                previous = record.count,
                count,
                "overwriting transaction count snapshot"
            );
        }

        record.block_height = block_height;
        record.count = count;

        self.store.save_snapshot(&record).await?;
        Ok(record)
    }
}
