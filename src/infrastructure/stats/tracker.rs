//! Fire-and-forget retrieval statistics

use std::sync::Arc;

use crate::domain::item::ScoredResult;
use crate::domain::search::ItemStore;
use crate::infrastructure::observability::record_items_surfaced;

/// Records which items a request surfaced, off the request path
///
/// Every call returns immediately; the store write runs on a spawned task
/// and failures are only logged.
#[derive(Debug, Clone)]
pub struct RetrievalStatsTracker {
    store: Arc<dyn ItemStore>,
}

impl RetrievalStatsTracker {
    pub fn new(store: Arc<dyn ItemStore>) -> Self {
        Self { store }
    }

    pub fn record_surfaced(&self, tenant_id: &str, result: &ScoredResult) {
        self.record_all(tenant_id, std::slice::from_ref(result));
    }

    /// Records every result of one request in a single background task
    pub fn record_all(&self, tenant_id: &str, results: &[ScoredResult]) {
        if results.is_empty() {
            return;
        }

        let store = self.store.clone();
        let tenant_id = tenant_id.to_string();
        let observations: Vec<_> = results
            .iter()
            .map(|r| (r.item.key(), r.combined_score))
            .collect();

        record_items_surfaced(observations.len());

        tokio::spawn(async move {
            for (key, score) in observations {
                if let Err(e) = store.record_surfaced(&tenant_id, &key, score).await {
                    tracing::warn!(
                        store = store.store_type(),
                        item = %key,
                        error = %e,
                        "Failed to record retrieval statistics"
                    );
                }
            }
        });
    }
}
