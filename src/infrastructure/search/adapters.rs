//! Search adapters enforcing the retrieval contract over any item store

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::search::{AccessScope, ItemStore, KeywordSearch, SearchHit, VectorSearch};
use crate::domain::DomainError;

pub const DEFAULT_SEARCH_TIMEOUT: Duration = Duration::from_millis(2_000);

/// Applies visibility, score range, ordering and `k` to raw backend hits
fn enforce_contract(scope: &AccessScope, hits: Vec<SearchHit>, k: usize) -> Vec<SearchHit> {
    let mut hits: Vec<SearchHit> = hits
        .into_iter()
        .filter(|hit| scope.permits(&hit.item))
        .filter(|hit| hit.score.is_finite() && hit.score > 0.0)
        .map(|mut hit| {
            hit.score = hit.score.min(1.0);
            hit
        })
        .collect();

    hits.sort_by(SearchHit::rank_order);
    hits.truncate(k);
    hits
}

async fn bounded<F>(index: &'static str, timeout: Duration, search: F) -> Result<Vec<SearchHit>, DomainError>
where
    F: std::future::Future<Output = Result<Vec<SearchHit>, DomainError>>,
{
    match tokio::time::timeout(timeout, search).await {
        Ok(Ok(hits)) => Ok(hits),
        Ok(Err(e @ DomainError::IndexUnavailable { .. })) => Err(e),
        Ok(Err(e)) => Err(DomainError::index_unavailable(index, e.to_string())),
        Err(_) => Err(DomainError::index_unavailable(
            index,
            format!("timed out after {}ms", timeout.as_millis()),
        )),
    }
}

/// Vector search over an item store
#[derive(Debug, Clone)]
pub struct IndexVectorSearch {
    store: Arc<dyn ItemStore>,
    timeout: Duration,
}

impl IndexVectorSearch {
    pub fn new(store: Arc<dyn ItemStore>) -> Self {
        Self {
            store,
            timeout: DEFAULT_SEARCH_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl VectorSearch for IndexVectorSearch {
    async fn search(
        &self,
        scope: &AccessScope,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<SearchHit>, DomainError> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let hits = bounded(
            "vector",
            self.timeout,
            self.store.vector_search(scope, vector, k),
        )
        .await?;

        tracing::debug!(
            store = self.store.store_type(),
            hits = hits.len(),
            "Vector search completed"
        );

        Ok(enforce_contract(scope, hits, k))
    }
}

/// Keyword search over an item store
#[derive(Debug, Clone)]
pub struct IndexKeywordSearch {
    store: Arc<dyn ItemStore>,
    timeout: Duration,
}

impl IndexKeywordSearch {
    pub fn new(store: Arc<dyn ItemStore>) -> Self {
        Self {
            store,
            timeout: DEFAULT_SEARCH_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl KeywordSearch for IndexKeywordSearch {
    async fn search(
        &self,
        scope: &AccessScope,
        query: &str,
        k: usize,
    ) -> Result<Vec<SearchHit>, DomainError> {
        if k == 0 || query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let hits = bounded(
            "keyword",
            self.timeout,
            self.store.keyword_search(scope, query, k),
        )
        .await?;

        tracing::debug!(
            store = self.store.store_type(),
            hits = hits.len(),
            "Keyword search completed"
        );

        Ok(enforce_contract(scope, hits, k))
    }
}
