use crate::selection::StoredSelection;

pub trait SelectionStorage {
    /// retrieve the list stored for `device_id`, if any
    fn selection(&self, device_id: &str) -> crate::Result<Option<StoredSelection>>;

    /// write or overwrite the list for `device_id`
    fn write_selection(
        &mut self,
        device_id: &str,
        selection: &StoredSelection,
    ) -> crate::Result<()>;

    /// delete the list for `device_id`; deleting a missing list is not an error
    fn remove_selection(&mut self, device_id: &str) -> crate::Result<()>;
}
