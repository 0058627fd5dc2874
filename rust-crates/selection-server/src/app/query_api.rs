use roulette::CountryId;
use std::future::Future;
use tokio::sync::oneshot;

pub trait QueryAPI {
    fn query(&mut self) -> impl Future<Output = crate::Result<Query>>;
}

#[derive(Debug)]
pub enum Query {
    Countries(CountriesQuery),
    SaveCountries(SaveCountriesQuery),
}

impl Query {
    pub fn countries(
        device_id: String,
        sender: oneshot::Sender<crate::Result<Vec<CountryId>>>,
    ) -> Self {
        Query::Countries(CountriesQuery { device_id, sender })
    }

    pub fn save_countries(
        device_id: String,
        countries: Vec<CountryId>,
        sender: oneshot::Sender<crate::Result<SaveOutcome>>,
    ) -> Self {
        Query::SaveCountries(SaveCountriesQuery {
            device_id,
            countries,
            sender,
        })
    }
}

#[derive(Debug)]
pub struct CountriesQuery {
    pub device_id: String,
    pub sender: oneshot::Sender<crate::Result<Vec<CountryId>>>,
}

#[derive(Debug)]
pub struct SaveCountriesQuery {
    pub device_id: String,
    pub countries: Vec<CountryId>,
    pub sender: oneshot::Sender<crate::Result<SaveOutcome>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    TooManyCountries { limit: usize },
}
