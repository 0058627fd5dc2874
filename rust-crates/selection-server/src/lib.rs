pub mod app;

pub mod selection;

pub type Result<T, E = anyhow::Error> = std::result::Result<T, E>;
