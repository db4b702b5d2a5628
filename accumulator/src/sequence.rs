use std::sync::Arc;

use model::{ArithmeticError, SampleId};
use store::RecordStore;

use crate::Result;
use crate::metadata::MetadataRecord;

/// Hands out the id that keys the next sample and aggregate.
///
/// `allocate` is a read; `advance` is the only mutation and runs once, at the
/// end of an observation, so the id used for keying is the pre-increment value.
pub struct SequenceAllocator<S: RecordStore> {
    metadata: Arc<MetadataRecord<S>>,
}

impl<S: RecordStore> SequenceAllocator<S> {
    pub fn new(metadata: Arc<MetadataRecord<S>>) -> Self {
        Self { metadata }
    }

    pub async fn allocate(&self) -> Result<SampleId> {
        Ok(self.metadata.get_or_init().await?.next_sample_id)
    }

    /// Increments `next_sample_id` by one and returns the new value.
    pub async fn advance(&self) -> Result<SampleId> {
        let mut metadata = self.metadata.get_or_init().await?;
        metadata.next_sample_id = metadata
            .next_sample_id
            .checked_add(1)
            .ok_or(ArithmeticError::Overflow {
                context: "nextSampleId",
            })?;

        self.metadata.save(&metadata).await?;
        Ok(metadata.next_sample_id)
    }
}
