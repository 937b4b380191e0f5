//! Item domain - Documents and structured records eligible for retrieval

mod entity;
mod scored;

pub use entity::{Document, ItemKey, ItemKind, SearchableItem, StructuredRecord};
pub use scored::{ScoredResult, Source};
