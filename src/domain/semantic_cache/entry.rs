use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::item::Source;
use crate::domain::routing::ModelTier;

/// A generated answer as stored in the semantic cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedAnswer {
    pub response: String,
    /// Sources in the order they were ranked for the original answer
    pub sources: Vec<Source>,
    pub model_tier: ModelTier,
    pub cached_at: DateTime<Utc>,
}

impl CachedAnswer {
    pub fn new(response: impl Into<String>, sources: Vec<Source>, model_tier: ModelTier) -> Self {
        Self {
            response: response.into(),
            sources,
            model_tier,
            cached_at: Utc::now(),
        }
    }
}

/// Lookup counters of a semantic cache instance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemanticCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub stores: u64,
    /// Lookups or stores that failed at the cache store and were treated as no-ops
    pub errors: u64,
}

impl SemanticCacheStats {
    pub fn hit_rate(&self) -> f32 {
        let total = self.hits + self.misses;

        if total == 0 {
            return 0.0;
        }

        self.hits as f32 / total as f32
    }
}
