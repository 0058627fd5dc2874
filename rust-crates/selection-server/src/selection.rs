use chrono::{
    DateTime,
    TimeDelta,
    Utc,
};
use roulette::CountryId;
use serde::{
    Deserialize,
    Serialize,
};

pub const DEFAULT_MAX_COUNTRIES: usize = 1024;

const KEY_PREFIX: &str = "country-roulette:";

/// Storage key of one device's list.
pub fn storage_key(device_id: &str) -> String {
    format!("{KEY_PREFIX}{device_id}")
}

/// A device's visit history as it sits in storage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredSelection {
    pub countries: Vec<CountryId>,
    pub updated_at: DateTime<Utc>,
}

impl StoredSelection {
    pub fn new(countries: Vec<CountryId>, updated_at: DateTime<Utc>) -> Self {
        Self {
            countries,
            updated_at,
        }
    }

    pub fn is_expired(&self, ttl: Option<TimeDelta>, now: DateTime<Utc>) -> bool {
        match ttl {
            Some(ttl) => now - self.updated_at >= ttl,
            None => false,
        }
    }
}

/// Limits applied to every stored list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionPolicy {
    pub max_countries: usize,
    /// Lists untouched for longer than this read as empty. `None` keeps them forever.
    pub ttl: Option<TimeDelta>,
}

impl SelectionPolicy {
    pub fn new(max_countries: usize, ttl_days: Option<u32>) -> Self {
        Self {
            max_countries,
            ttl: ttl_days.map(|days| TimeDelta::days(i64::from(days))),
        }
    }
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_COUNTRIES, None)
    }
}
