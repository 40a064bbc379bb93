//! Mod Station core library exports

pub mod catalog;
pub mod clock;
pub mod config;
pub mod error;
pub mod store;
pub mod version;

#[cfg(test)]
mod test_support;

pub use catalog::{Catalog, CatalogView, ListFilter, ListingCache};
pub use config::StationConfig;
pub use error::{CatalogError, ConfigError, StoreError};
pub use store::{MemoryStore, ObjectStore};
