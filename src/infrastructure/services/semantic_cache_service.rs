//! Semantic answer caching service

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::domain::cache::{normalize_query, Cache, CacheExt, HashedKeyBuilder};
use crate::domain::item::Source;
use crate::domain::routing::ModelTier;
use crate::domain::semantic_cache::{CachedAnswer, SemanticCacheConfig, SemanticCacheStats};
use crate::domain::DomainError;
use crate::infrastructure::observability::{record_cache_lookup, CacheLookup};

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    stores: AtomicU64,
    errors: AtomicU64,
}

/// Caches complete answers per tenant, role and normalized query
///
/// Cache store failures never surface: a failed lookup is a miss and a
/// failed store is dropped. Both are logged and counted in [`stats`].
///
/// [`stats`]: SemanticCacheService::stats
#[derive(Debug, Clone)]
pub struct SemanticCacheService {
    cache: Arc<dyn Cache>,
    config: SemanticCacheConfig,
    keys: HashedKeyBuilder,
    enabled: Arc<AtomicBool>,
    counters: Arc<Counters>,
}

impl SemanticCacheService {
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        Self::with_config(cache, SemanticCacheConfig::default())
    }

    pub fn with_config(cache: Arc<dyn Cache>, config: SemanticCacheConfig) -> Self {
        Self {
            cache,
            keys: HashedKeyBuilder::new(config.namespace.clone()),
            enabled: Arc::new(AtomicBool::new(config.enabled)),
            config,
            counters: Arc::default(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn config(&self) -> &SemanticCacheConfig {
        &self.config
    }

    /// Key always carries tenant and role so answers never cross either boundary
    pub fn cache_key(&self, tenant_id: &str, role: &str, query: &str) -> String {
        self.keys
            .key("semantic", &[tenant_id, role, &normalize_query(query)])
    }

    pub async fn lookup(&self, tenant_id: &str, role: &str, query: &str) -> Option<CachedAnswer> {
        if !self.is_enabled() {
            return None;
        }

        let key = self.cache_key(tenant_id, role, query);

        match self.cache.get::<CachedAnswer>(&key).await {
            Ok(Some(answer)) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                record_cache_lookup("semantic", CacheLookup::Hit);
                tracing::debug!(tenant_id, role, "Semantic cache hit");
                Some(answer)
            }
            Ok(None) => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                record_cache_lookup("semantic", CacheLookup::Miss);
                None
            }
            Err(e) => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                self.counters.errors.fetch_add(1, Ordering::Relaxed);
                record_cache_lookup("semantic", CacheLookup::Error);
                tracing::warn!(tenant_id, error = %e, "Semantic cache lookup failed, treating as miss");
                None
            }
        }
    }

    /// Stores a successful answer; returns whether it was written
    pub async fn store(
        &self,
        tenant_id: &str,
        role: &str,
        query: &str,
        response: &str,
        sources: &[Source],
        model_tier: ModelTier,
    ) -> bool {
        if !self.is_enabled() {
            return false;
        }

        let key = self.cache_key(tenant_id, role, query);
        let answer = CachedAnswer::new(response, sources.to_vec(), model_tier);

        match self.cache.set(&key, &answer, self.config.ttl()).await {
            Ok(()) => {
                self.counters.stores.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(e) => {
                self.counters.errors.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(tenant_id, error = %e, "Failed to store answer in semantic cache");
                false
            }
        }
    }

    pub async fn invalidate(
        &self,
        tenant_id: &str,
        role: &str,
        query: &str,
    ) -> Result<bool, DomainError> {
        self.cache
            .delete(&self.cache_key(tenant_id, role, query))
            .await
    }

    pub fn stats(&self) -> SemanticCacheStats {
        SemanticCacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            stores: self.counters.stores.load(Ordering::Relaxed),
            errors: self.counters.errors.load(Ordering::Relaxed),
        }
    }
}
