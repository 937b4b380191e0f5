//! Semantic answer cache domain models
//!
//! Answers are keyed by the exact (tenant, role, normalised query) triple,
//! hashed into a bounded key.

mod config;
mod entry;

pub use config::SemanticCacheConfig;
pub use entry::{CachedAnswer, SemanticCacheStats};
