//! Scored retrieval results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entity::{ItemKey, ItemKind, SearchableItem};

/// An item with its per-backend scores after hybrid fusion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredResult {
    pub item: SearchableItem,
    /// 0 when the vector backend did not return the item
    pub vector_score: f32,
    /// 0 when the keyword backend did not return the item
    pub keyword_score: f32,
    pub combined_score: f32,
}

impl ScoredResult {
    pub fn key(&self) -> ItemKey {
        self.item.key()
    }

    /// Compact copy suitable for caching and returning to callers
    pub fn snapshot(&self) -> Source {
        Source {
            kind: self.item.kind(),
            id: self.item.id().to_string(),
            title: self.item.title().map(str::to_string),
            content_type: self.item.content_type().to_string(),
            source_ref: self.item.source_reference(),
            updated_at: self.item.updated_at(),
            vector_score: self.vector_score,
            keyword_score: self.keyword_score,
            combined_score: self.combined_score,
        }
    }
}

/// Snapshot of a retrieved item as reported with an answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub kind: ItemKind,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub content_type: String,
    pub source_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    pub vector_score: f32,
    pub keyword_score: f32,
    pub combined_score: f32,
}
