//! Search domain - Retrieval backend contracts

mod provider;

pub use provider::{AccessScope, ItemStats, ItemStore, KeywordSearch, SearchHit, VectorSearch};

#[cfg(test)]
pub use provider::mock::UnavailableIndex;
