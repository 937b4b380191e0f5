//! Search traits for the vector and keyword retrieval backends

use std::cmp::Ordering;
use std::fmt::Debug;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::item::{ItemKey, SearchableItem};
use crate::domain::DomainError;

/// Caller identity every search is filtered by
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccessScope {
    pub tenant_id: String,
    pub role: String,
}

impl AccessScope {
    pub fn new(tenant_id: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            role: role.into(),
        }
    }

    /// An item is eligible only for its own tenant and a role it lists
    pub fn permits(&self, item: &SearchableItem) -> bool {
        item.is_visible_to(&self.tenant_id, &self.role)
    }
}

/// A single ranked hit from one backend
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub item: SearchableItem,
    pub score: f32,
}

impl SearchHit {
    pub fn new(item: impl Into<SearchableItem>, score: f32) -> Self {
        Self {
            item: item.into(),
            score,
        }
    }

    /// Ranked order: score descending, then id ascending, then kind
    pub fn rank_order(&self, other: &Self) -> Ordering {
        other
            .score
            .total_cmp(&self.score)
            .then_with(|| self.item.id().cmp(other.item.id()))
            .then_with(|| self.item.kind().cmp(&other.item.kind()))
    }
}

/// Per-item retrieval statistics kept by the item store
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemStats {
    pub retrieval_count: u64,
    /// Running mean of the combined score each time the item was surfaced
    pub mean_relevance: f64,
}

impl ItemStats {
    /// Folds one more observation into the running mean
    pub fn observe(&mut self, score: f32) {
        self.retrieval_count += 1;
        self.mean_relevance += (score as f64 - self.mean_relevance) / self.retrieval_count as f64;
    }
}

/// Ranks visible items by similarity to a query vector
///
/// Returns at most `k` hits ordered by descending score. Items without a
/// matching signal are absent. A backend failure is an
/// [`DomainError::IndexUnavailable`], never an empty list.
#[async_trait]
pub trait VectorSearch: Send + Sync + Debug {
    async fn search(
        &self,
        scope: &AccessScope,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<SearchHit>, DomainError>;
}

/// Ranks visible items by lexical relevance to the query text
///
/// Same ordering, visibility and failure contract as [`VectorSearch`].
#[async_trait]
pub trait KeywordSearch: Send + Sync + Debug {
    async fn search(
        &self,
        scope: &AccessScope,
        query: &str,
        k: usize,
    ) -> Result<Vec<SearchHit>, DomainError>;
}

/// Storage backend holding the items and their retrieval statistics
///
/// Implementations may filter by scope at the storage layer; the search
/// adapters re-check visibility regardless.
#[async_trait]
pub trait ItemStore: Send + Sync + Debug {
    /// Backend name used in logs and errors
    fn store_type(&self) -> &'static str;

    async fn vector_search(
        &self,
        scope: &AccessScope,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<SearchHit>, DomainError>;

    async fn keyword_search(
        &self,
        scope: &AccessScope,
        text: &str,
        k: usize,
    ) -> Result<Vec<SearchHit>, DomainError>;

    /// Increments the retrieval counter and folds `score` into the running relevance mean
    async fn record_surfaced(
        &self,
        tenant_id: &str,
        key: &ItemKey,
        score: f32,
    ) -> Result<(), DomainError>;
}
