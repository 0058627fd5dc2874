use crate::catalog::CountryId;
use std::future::Future;
use tokio::sync::{
    mpsc,
    oneshot,
};
use tracing::{
    debug,
    warn,
};

/// Remote key-value storage for one device's visit history.
pub trait SelectionBackend {
    /// Fetch the stored history; an unknown device yields an empty list.
    fn load(
        &self,
        device_id: &str,
    ) -> impl Future<Output = crate::Result<Vec<CountryId>>> + Send;

    /// Replace the stored history with `countries`.
    fn save(
        &self,
        device_id: &str,
        countries: &[CountryId],
    ) -> impl Future<Output = crate::Result<()>> + Send;
}

#[derive(Debug)]
enum PersistCommand {
    Save(Vec<CountryId>),
    Flush(oneshot::Sender<()>),
}

/// The visited-country history of one device.
///
/// Mutations apply to memory immediately and are then pushed, whole, to the backend
/// by a background task. Failed saves are logged and never roll back memory.
#[derive(Debug)]
pub struct SelectionStore {
    device_id: String,
    used: Vec<CountryId>,
    persist: mpsc::UnboundedSender<PersistCommand>,
}

impl SelectionStore {
    /// Must be called from within a tokio runtime.
    pub fn new<B>(device_id: impl Into<String>, backend: B) -> Self
    where
        B: SelectionBackend + Send + Sync + 'static,
    {
        Self::with_used(device_id, backend, Vec::new())
    }

    pub fn with_used<B>(device_id: impl Into<String>, backend: B, used: Vec<CountryId>) -> Self
    where
        B: SelectionBackend + Send + Sync + 'static,
    {
        let device_id = device_id.into();
        let (persist, commands) = mpsc::unbounded_channel();
        tokio::spawn(persistence_worker(device_id.clone(), backend, commands));
        Self {
            device_id,
            used,
            persist,
        }
    }

    /// Builds the store from the backend's copy. A failed fetch is logged and the
    /// session starts from an empty history.
    pub async fn load<B>(device_id: impl Into<String>, backend: B) -> Self
    where
        B: SelectionBackend + Send + Sync + 'static,
    {
        let device_id = device_id.into();
        let used = match backend.load(&device_id).await {
            Ok(used) => {
                debug!(%device_id, count = used.len(), "loaded used countries");
                used
            }
            Err(err) => {
                warn!(?err, %device_id, "failed to load used countries");
                Vec::new()
            }
        };
        Self::with_used(device_id, backend, used)
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn used(&self) -> &[CountryId] {
        &self.used
    }

    pub fn len(&self) -> usize {
        self.used.len()
    }

    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }

    pub fn contains(&self, id: &CountryId) -> bool {
        self.used.contains(id)
    }

    pub fn last(&self) -> Option<&CountryId> {
        self.used.last()
    }

    /// Records a visit. Returns `false` for an id that is already in the history.
    pub fn append(&mut self, id: CountryId) -> bool {
        if self.used.contains(&id) {
            debug!(%id, "country already used; not appending");
            return false;
        }
        self.used.push(id);
        self.persist();
        true
    }

    pub fn undo_last(&mut self) -> Option<CountryId> {
        let removed = self.used.pop()?;
        self.persist();
        Some(removed)
    }

    pub fn remove(&mut self, id: &CountryId) -> bool {
        let Some(position) = self.used.iter().position(|used| used == id) else {
            return false;
        };
        self.used.remove(position);
        self.persist();
        true
    }

    pub fn reset(&mut self) {
        self.used.clear();
        self.persist();
    }

    /// Resolves once every save queued before this call has been attempted.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.persist.send(PersistCommand::Flush(done)).is_ok() {
            let _ = wait.await;
        }
    }

    fn persist(&self) {
        if self
            .persist
            .send(PersistCommand::Save(self.used.clone()))
            .is_err()
        {
            warn!(
                device_id = %self.device_id,
                "persistence worker stopped; change kept in memory only"
            );
        }
    }
}

async fn persistence_worker<B: SelectionBackend>(
    device_id: String,
    backend: B,
    mut commands: mpsc::UnboundedReceiver<PersistCommand>,
) {
    while let Some(command) = commands.recv().await {
        match command {
            PersistCommand::Save(countries) => {
                match backend.save(&device_id, &countries).await {
                    Ok(()) => {
                        debug!(%device_id, count = countries.len(), "saved used countries")
                    }
                    Err(err) => warn!(?err, %device_id, "failed to save used countries"),
                }
            }
            PersistCommand::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
}
