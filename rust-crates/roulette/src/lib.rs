//! Core of the country roulette: the catalog of countries, centroid geometry,
//! eligibility draws, the decelerating spin engine and the visited-country store.

pub mod catalog;
pub mod eligibility;
pub mod geometry;
pub mod selection;
pub mod spin;

pub use catalog::{
    Catalog,
    Country,
    CountryId,
};
pub use geometry::{
    Coordinates,
    Position,
};
pub use selection::{
    SelectionBackend,
    SelectionStore,
};
pub use spin::{
    SpinConfig,
    SpinEngine,
    SpinEvent,
    SpinState,
};

pub type Result<T, E = anyhow::Error> = std::result::Result<T, E>;
