//! In-memory item store for development and testing

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::RwLock;
use unicode_segmentation::UnicodeSegmentation;

use crate::domain::embedding::{cosine_similarity, EmbeddingProvider, EmbeddingRequest};
use crate::domain::item::{ItemKey, SearchableItem};
use crate::domain::search::{AccessScope, ItemStats, ItemStore, SearchHit};
use crate::domain::DomainError;

/// Item store holding everything in process memory
///
/// Vector search is brute-force cosine similarity over items that carry an
/// embedding. Keyword search is a TF-IDF ranking over the caller's visible
/// items, scaled so the best hit scores 1.
#[derive(Debug, Default)]
pub struct InMemoryItemStore {
    items: Arc<RwLock<Vec<SearchableItem>>>,
    stats: Arc<RwLock<HashMap<(String, ItemKey), ItemStats>>>,
}

/// Accepted fixture layouts: a bare array or `{"items": [...]}`
#[derive(Deserialize)]
#[serde(untagged)]
enum Fixture {
    Items(Vec<SearchableItem>),
    Wrapped { items: Vec<SearchableItem> },
}

impl InMemoryItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(items: Vec<SearchableItem>) -> Self {
        Self {
            items: Arc::new(RwLock::new(items)),
            stats: Arc::default(),
        }
    }

    /// Loads items from a JSON fixture file
    pub async fn from_fixture_file(path: impl AsRef<Path>) -> Result<Self, DomainError> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            DomainError::storage(format!("Failed to read fixture {}: {}", path.display(), e))
        })?;

        Self::from_fixture_json(&raw)
    }

    pub fn from_fixture_json(raw: &str) -> Result<Self, DomainError> {
        let fixture: Fixture = serde_json::from_str(raw)
            .map_err(|e| DomainError::validation(format!("Invalid item fixture: {}", e)))?;

        let items = match fixture {
            Fixture::Items(items) | Fixture::Wrapped { items } => items,
        };

        Ok(Self::with_items(items))
    }

    /// Inserts an item, replacing any item with the same tenant and key
    pub async fn upsert(&self, item: SearchableItem) {
        let mut items = self.items.write().await;

        match items
            .iter_mut()
            .find(|existing| existing.tenant_id() == item.tenant_id() && existing.key() == item.key())
        {
            Some(existing) => *existing = item,
            None => items.push(item),
        }
    }

    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }

    /// Embeds every item that has no vector yet, in one batch
    pub async fn embed_missing(&self, provider: &dyn EmbeddingProvider) -> Result<usize, DomainError> {
        let mut items = self.items.write().await;

        let missing: Vec<usize> = items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.embedding().is_none())
            .map(|(idx, _)| idx)
            .collect();

        if missing.is_empty() {
            return Ok(0);
        }

        let texts = missing.iter().map(|&idx| items[idx].text()).collect();
        let vectors = provider.embed(EmbeddingRequest::batch(texts)).await?.into_vectors();

        if vectors.len() != missing.len() {
            return Err(DomainError::embedding(format!(
                "Expected {} embeddings, got {}",
                missing.len(),
                vectors.len()
            )));
        }

        for (idx, vector) in missing.iter().zip(vectors) {
            items[*idx].set_embedding(vector);
        }

        tracing::debug!(count = missing.len(), "Embedded fixture items");
        Ok(missing.len())
    }

    pub async fn stats(&self, tenant_id: &str, key: &ItemKey) -> Option<ItemStats> {
        self.stats
            .read()
            .await
            .get(&(tenant_id.to_string(), key.clone()))
            .copied()
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.unicode_words().map(str::to_lowercase)
}

fn term_counts(text: &str) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for token in tokenize(text) {
        *counts.entry(token).or_insert(0) += 1;
    }
    counts
}

fn rank(mut hits: Vec<SearchHit>, k: usize) -> Vec<SearchHit> {
    hits.sort_by(SearchHit::rank_order);
    hits.truncate(k);
    hits
}

#[async_trait]
impl ItemStore for InMemoryItemStore {
    fn store_type(&self) -> &'static str {
        "in_memory"
    }

    async fn vector_search(
        &self,
        scope: &AccessScope,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<SearchHit>, DomainError> {
        let items = self.items.read().await;

        let hits = items
            .iter()
            .filter(|item| scope.permits(item))
            .filter_map(|item| {
                let score = cosine_similarity(item.embedding()?, vector);
                (score > 0.0).then(|| SearchHit::new(item.clone(), score))
            })
            .collect();

        Ok(rank(hits, k))
    }

    async fn keyword_search(
        &self,
        scope: &AccessScope,
        text: &str,
        k: usize,
    ) -> Result<Vec<SearchHit>, DomainError> {
        let query_terms: BTreeSet<String> = tokenize(text).collect();
        if query_terms.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let items = self.items.read().await;
        let visible: Vec<(&SearchableItem, HashMap<String, usize>)> = items
            .iter()
            .filter(|item| scope.permits(item))
            .map(|item| (item, term_counts(&item.text())))
            .collect();

        let total = visible.len() as f32;
        let idf: HashMap<&str, f32> = query_terms
            .iter()
            .filter_map(|term| {
                let df = visible.iter().filter(|(_, counts)| counts.contains_key(term)).count();
                (df > 0).then(|| (term.as_str(), (1.0 + total / df as f32).ln()))
            })
            .collect();

        let raw: Vec<(&SearchableItem, f32)> = visible
            .iter()
            .filter_map(|(item, counts)| {
                let score: f32 = idf
                    .iter()
                    .filter_map(|(term, idf)| {
                        counts.get(*term).map(|&tf| (1.0 + (tf as f32).ln()) * idf)
                    })
                    .sum();
                (score > 0.0).then_some((*item, score))
            })
            .collect();

        let max = raw.iter().map(|(_, score)| *score).fold(0.0f32, f32::max);
        let hits = raw
            .into_iter()
            .map(|(item, score)| SearchHit::new(item.clone(), score / max))
            .collect();

        Ok(rank(hits, k))
    }

    async fn record_surfaced(
        &self,
        tenant_id: &str,
        key: &ItemKey,
        score: f32,
    ) -> Result<(), DomainError> {
        self.stats
            .write()
            .await
            .entry((tenant_id.to_string(), key.clone()))
            .or_default()
            .observe(score);

        Ok(())
    }
}
