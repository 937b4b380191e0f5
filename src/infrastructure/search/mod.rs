//! Item stores and search adapters

mod adapters;
mod in_memory;
mod postgres;

#[cfg(test)]
pub mod fixtures;

pub use adapters::{IndexKeywordSearch, IndexVectorSearch, DEFAULT_SEARCH_TIMEOUT};
pub use in_memory::InMemoryItemStore;
pub use postgres::{PostgresItemStore, PostgresStoreConfig};
