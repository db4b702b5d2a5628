use std::sync::Arc;

use model::LastPointer;
use store::RecordStore;

use crate::Result;

/// Key-value accessor for the `LastPointer` singleton. Whether the record
/// exists is the only thing that separates a bootstrap from a fold.
pub struct LastPointerRegistry<S: RecordStore> {
    store: Arc<S>,
}

impl<S: RecordStore> LastPointerRegistry<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn load(&self) -> Result<Option<LastPointer>> {
        Ok(self.store.load_last_pointer().await?)
    }

    pub async fn save(&self, pointer: &LastPointer) -> Result<()> {
        Ok(self.store.save_last_pointer(pointer).await?)
    }
}
