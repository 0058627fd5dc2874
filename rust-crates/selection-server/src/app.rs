use crate::{
    Result,
    app::{
        query_api::{
            CountriesQuery,
            Query,
            QueryAPI,
            SaveCountriesQuery,
            SaveOutcome,
        },
        selection_storage::SelectionStorage,
    },
    selection::{
        SelectionPolicy,
        StoredSelection,
    },
};
use chrono::{
    DateTime,
    Utc,
};
use roulette::CountryId;
use std::future::Future;
use tracing_subscriber::EnvFilter;

pub mod actix_query_api;
pub mod in_memory_selection_storage;
pub mod query_api;
pub mod selection_storage;
pub mod sled_storage;


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Continue,
    Exit,
}

/// Owns the storage and answers queries forwarded by the HTTP layer, one at a time.
pub struct App<API, Storage> {
    api: API,
    storage: Storage,
    policy: SelectionPolicy,
}

impl<API, Storage> App<API, Storage> {
    pub fn new(api: API, storage: Storage, policy: SelectionPolicy) -> Self {
        Self {
            api,
            storage,
            policy,
        }
    }

    pub fn api(&self) -> &API {
        &self.api
    }
}

impl<API: QueryAPI, Storage: SelectionStorage> App<API, Storage> {
    /// Serves one query, or returns [`RunState::Exit`] once `interrupt` resolves.
    pub async fn run(&mut self, interrupt: impl Future<Output = ()>) -> Result<RunState> {
        tokio::select! {
            query = self.api.query() => {
                self.handle_query(query?, Utc::now());
                Ok(RunState::Continue)
            }
            _ = interrupt => Ok(RunState::Exit),
        }
    }

    fn handle_query(&mut self, query: Query, now: DateTime<Utc>) {
        match query {
            Query::Countries(CountriesQuery { device_id, sender }) => {
                let result = self.countries(&device_id, now);
                if sender.send(result).is_err() {
                    tracing::debug!(%device_id, "countries requester went away");
                }
            }
            Query::SaveCountries(SaveCountriesQuery {
                device_id,
                countries,
                sender,
            }) => {
                let result = self.save_countries(&device_id, countries, now);
                if sender.send(result).is_err() {
                    tracing::debug!(%device_id, "save requester went away");
                }
            }
        }
    }

    fn countries(&mut self, device_id: &str, now: DateTime<Utc>) -> Result<Vec<CountryId>> {
        let Some(stored) = self.storage.selection(device_id)? else {
            return Ok(Vec::new());
        };
        if stored.is_expired(self.policy.ttl, now) {
            tracing::info!(
                %device_id,
                updated_at = %stored.updated_at,
                "dropping expired selection"
            );
            self.storage.remove_selection(device_id)?;
            return Ok(Vec::new());
        }
        Ok(stored.countries)
    }

    fn save_countries(
        &mut self,
        device_id: &str,
        countries: Vec<CountryId>,
        now: DateTime<Utc>,
    ) -> Result<SaveOutcome> {
        let limit = self.policy.max_countries;
        if countries.len() > limit {
            tracing::warn!(
                %device_id,
                count = countries.len(),
                limit,
                "rejecting oversized selection"
            );
            return Ok(SaveOutcome::TooManyCountries { limit });
        }
        let count = countries.len();
        self.storage
            .write_selection(device_id, &StoredSelection::new(countries, now))?;
        tracing::debug!(%device_id, count, "stored selection");
        Ok(SaveOutcome::Saved)
    }
}

pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
