//! Memoized query embeddings

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::cache::{normalize_query, Cache, CacheExt, HashedKeyBuilder};
use crate::domain::embedding::{EmbeddingProvider, EmbeddingRequest};
use crate::domain::DomainError;
use crate::infrastructure::observability::{record_cache_lookup, CacheLookup};

/// Configuration for the embedding cache
#[derive(Debug, Clone)]
pub struct EmbeddingCacheConfig {
    pub namespace: String,
    pub ttl: Duration,
    /// Upper bound for one embedding service call
    pub timeout: Duration,
}

impl Default for EmbeddingCacheConfig {
    fn default() -> Self {
        Self {
            namespace: "rag".to_string(),
            ttl: Duration::from_secs(7 * 24 * 3600),
            timeout: Duration::from_secs(10),
        }
    }
}

impl EmbeddingCacheConfig {
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_ttl_days(mut self, days: u64) -> Self {
        self.ttl = Duration::from_secs(days * 24 * 3600);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Text to vector lookups backed by a cache store
///
/// Keys hash the provider model together with the normalized text, and the
/// normalized text is what gets embedded. Concurrent misses on the same text
/// may each call the provider; the last write wins.
#[derive(Debug, Clone)]
pub struct EmbeddingCache {
    provider: Arc<dyn EmbeddingProvider>,
    cache: Arc<dyn Cache>,
    keys: HashedKeyBuilder,
    config: EmbeddingCacheConfig,
}

impl EmbeddingCache {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, cache: Arc<dyn Cache>) -> Self {
        Self::with_config(provider, cache, EmbeddingCacheConfig::default())
    }

    pub fn with_config(
        provider: Arc<dyn EmbeddingProvider>,
        cache: Arc<dyn Cache>,
        config: EmbeddingCacheConfig,
    ) -> Self {
        Self {
            provider,
            cache,
            keys: HashedKeyBuilder::new(config.namespace.clone()),
            config,
        }
    }

    pub fn cache_key(&self, normalized: &str) -> String {
        self.keys
            .key("embedding", &[self.provider.model(), normalized])
    }

    /// Returns the cached vector for `text`, computing and storing it on a miss
    pub async fn get_or_compute(&self, text: &str) -> Result<Vec<f32>, DomainError> {
        let normalized = normalize_query(text);
        let key = self.cache_key(&normalized);

        if let Some(vector) = self.lookup(&key).await {
            return Ok(vector);
        }

        let mut vectors = self.embed(vec![normalized]).await?;
        let vector = vectors
            .pop()
            .ok_or_else(|| DomainError::embedding("Embedding service returned no vector"))?;

        self.store(&key, &vector).await;
        Ok(vector)
    }

    /// Vectors for every text in input order, embedding all misses in a single call
    pub async fn get_or_compute_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, DomainError> {
        let mut results: Vec<Option<Vec<f32>>> = vec![None; texts.len()];
        // normalized text -> positions waiting on it
        let mut pending: HashMap<String, Vec<usize>> = HashMap::new();
        let mut order: Vec<String> = Vec::new();

        for (idx, text) in texts.iter().enumerate() {
            let normalized = normalize_query(text);

            if let Some(positions) = pending.get_mut(&normalized) {
                positions.push(idx);
                continue;
            }

            match self.lookup(&self.cache_key(&normalized)).await {
                Some(vector) => results[idx] = Some(vector),
                None => {
                    pending.insert(normalized.clone(), vec![idx]);
                    order.push(normalized);
                }
            }
        }

        if !order.is_empty() {
            let vectors = self.embed(order.clone()).await?;

            for (normalized, vector) in order.iter().zip(vectors) {
                self.store(&self.cache_key(normalized), &vector).await;

                for &idx in pending.get(normalized).into_iter().flatten() {
                    results[idx] = Some(vector.clone());
                }
            }
        }

        results
            .into_iter()
            .map(|vector| vector.ok_or_else(|| DomainError::embedding("Missing embedding for input")))
            .collect()
    }

    /// Explicit removal, mainly for tests and reindexing
    pub async fn invalidate(&self, text: &str) -> Result<bool, DomainError> {
        self.cache
            .delete(&self.cache_key(&normalize_query(text)))
            .await
    }

    async fn lookup(&self, key: &str) -> Option<Vec<f32>> {
        match self.cache.get::<Vec<f32>>(key).await {
            Ok(Some(vector)) if !vector.is_empty() => {
                record_cache_lookup("embedding", CacheLookup::Hit);
                Some(vector)
            }
            Ok(_) => {
                record_cache_lookup("embedding", CacheLookup::Miss);
                None
            }
            Err(e) => {
                record_cache_lookup("embedding", CacheLookup::Error);
                tracing::warn!(error = %e, "Embedding cache lookup failed, treating as miss");
                None
            }
        }
    }

    async fn store(&self, key: &str, vector: &Vec<f32>) {
        if let Err(e) = self.cache.set(key, vector, self.config.ttl).await {
            tracing::warn!(error = %e, "Failed to cache embedding");
        }
    }

    async fn embed(&self, inputs: Vec<String>) -> Result<Vec<Vec<f32>>, DomainError> {
        let expected = inputs.len();
        let request = EmbeddingRequest::batch(inputs);

        let response = tokio::time::timeout(self.config.timeout, self.provider.embed(request))
            .await
            .map_err(|_| {
                DomainError::embedding(format!(
                    "Embedding service timed out after {}ms",
                    self.config.timeout.as_millis()
                ))
            })??;

        let vectors = response.into_vectors();
        if vectors.len() != expected || vectors.iter().any(Vec::is_empty) {
            return Err(DomainError::embedding(format!(
                "Expected {} embeddings, got {}",
                expected,
                vectors.len()
            )));
        }

        tracing::debug!(
            provider = self.provider.provider_name(),
            count = expected,
            "Computed embeddings"
        );

        Ok(vectors)
    }
}
