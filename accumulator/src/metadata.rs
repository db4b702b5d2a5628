use std::sync::Arc;

use model::{Metadata, SampleId};
use store::RecordStore;
use tracing::info;

use crate::Result;

/// Lazily created `Metadata` singleton shared by the sequence allocator and
/// the transaction counter. Nothing else touches the record.
pub struct MetadataRecord<S: RecordStore> {
    store: Arc<S>,
    start_sample_id: SampleId,
}

impl<S: RecordStore> MetadataRecord<S> {
    pub fn new(store: Arc<S>, start_sample_id: SampleId) -> Self {
        Self {
            store,
            start_sample_id,
        }
    }

    pub async fn load(&self) -> Result<Option<Metadata>> {
        Ok(self.store.load_metadata().await?)
    }

    /// Creates and persists the initial record. Only called when `load`
    /// returned `None`.
    async fn initialize(&self) -> Result<Metadata> {
        let metadata = Metadata::new(self.start_sample_id);
        self.store.save_metadata(&metadata).await?;

        info!(
            next_sample_id = metadata.next_sample_id,
            "metadata initialized"
        );
        Ok(metadata)
    }

    pub async fn get_or_init(&self) -> Result<Metadata> {
        match self.load().await? {
            Some(m) => Ok(m),
            None => self.initialize().await,
        }
    }

    pub async fn save(&self, metadata: &Metadata) -> Result<()> {
        Ok(self.store.save_metadata(metadata).await?)
    }
}
