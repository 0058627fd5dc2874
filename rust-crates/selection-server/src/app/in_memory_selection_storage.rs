use crate::{
    app::selection_storage::SelectionStorage,
    selection::{
        StoredSelection,
        storage_key,
    },
};
use std::{
    collections::HashMap,
    sync::{
        Arc,
        Mutex,
        MutexGuard,
        PoisonError,
    },
};

#[derive(Clone, Default)]
pub struct InMemorySelectionStorage {
    selections: Arc<Mutex<HashMap<String, StoredSelection>>>,
}

impl InMemorySelectionStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selections(&self) -> Arc<Mutex<HashMap<String, StoredSelection>>> {
        self.selections.clone()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, StoredSelection>> {
        self.selections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl SelectionStorage for InMemorySelectionStorage {
    fn selection(&self, device_id: &str) -> crate::Result<Option<StoredSelection>> {
        Ok(self.lock().get(&storage_key(device_id)).cloned())
    }

    fn write_selection(
        &mut self,
        device_id: &str,
        selection: &StoredSelection,
    ) -> crate::Result<()> {
        self.lock()
            .insert(storage_key(device_id), selection.clone());
        Ok(())
    }

    fn remove_selection(&mut self, device_id: &str) -> crate::Result<()> {
        self.lock().remove(&storage_key(device_id));
        Ok(())
    }
}
