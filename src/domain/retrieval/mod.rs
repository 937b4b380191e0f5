//! Retrieval domain - Hybrid fusion of search backends

mod hybrid;

pub use hybrid::{HybridCombiner, HybridConfig};
