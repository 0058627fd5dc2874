// Sled-backed storage for per-device visit histories.
use crate::{
    app::selection_storage::SelectionStorage,
    selection::{
        StoredSelection,
        storage_key,
    },
};
use anyhow::Context;
use serde::de::DeserializeOwned;
use sled::{
    Config,
    Db,
    Tree,
};
use std::path::Path;

const SELECTIONS_TREE: &str = "selections";

#[derive(Clone)]
pub struct SledSelectionStorage {
    tree: Tree,
}

impl SledSelectionStorage {
    pub fn new(db: &Db) -> crate::Result<Self> {
        let tree = db
            .open_tree(SELECTIONS_TREE)
            .context("open selections tree")?;
        Ok(Self { tree })
    }

    pub fn open<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let config = Config::default().path(path);
        let db = config.open().context("open sled database")?;
        Self::new(&db)
    }

    /// Number of stored lists, expired ones included.
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}

impl SelectionStorage for SledSelectionStorage {
    fn selection(&self, device_id: &str) -> crate::Result<Option<StoredSelection>> {
        let key = storage_key(device_id);
        let value = match self.tree.get(key.as_bytes()).context("read selection")? {
            Some(value) => value,
            None => return Ok(None),
        };
        let record = deserialize::<StoredSelection>(value.as_ref())?;
        Ok(Some(record))
    }

    fn write_selection(
        &mut self,
        device_id: &str,
        selection: &StoredSelection,
    ) -> crate::Result<()> {
        let key = storage_key(device_id);
        let bytes = serde_json::to_vec(selection).context("serialize selection record")?;
        self.tree
            .insert(key.as_bytes(), bytes)
            .context("persist selection")?;
        self.tree.flush().context("flush selections")?;
        Ok(())
    }

    fn remove_selection(&mut self, device_id: &str) -> crate::Result<()> {
        let key = storage_key(device_id);
        self.tree
            .remove(key.as_bytes())
            .context("remove selection")?;
        self.tree.flush().context("flush selections")?;
        Ok(())
    }
}

fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> crate::Result<T> {
    serde_json::from_slice(bytes).context("deserialize sled record")
}
