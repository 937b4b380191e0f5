use std::time::Duration;

use serde::Deserialize;

use crate::domain::retrieval::HybridConfig;
use crate::domain::routing::DEFAULT_TRIGGER_TERMS;
use crate::infrastructure::cache::{CacheConfig, CacheType};
use crate::infrastructure::logging::LoggingConfig;
use crate::infrastructure::observability::ObservabilityConfig;

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub context: ContextConfig,
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub embedding: EmbeddingSettings,
    #[serde(default)]
    pub generation: GenerationSettings,
    #[serde(default)]
    pub store: StoreSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Weight of the vector score in the hybrid blend
    pub alpha: f32,
    pub top_k: usize,
    pub overfetch_factor: usize,
    pub search_timeout_ms: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            alpha: HybridConfig::default().alpha(),
            top_k: 5,
            overfetch_factor: 2,
            search_timeout_ms: 2_000,
        }
    }
}

impl RetrievalConfig {
    pub fn search_timeout(&self) -> Duration {
        Duration::from_millis(self.search_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    pub history_turns: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            history_turns: crate::domain::context::DEFAULT_HISTORY_TURNS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub trigger_terms: Vec<String>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            trigger_terms: DEFAULT_TRIGGER_TERMS.iter().map(|t| t.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// `memory` or `redis`
    pub backend: String,
    pub redis_url: Option<String>,
    pub key_prefix: Option<String>,
    pub max_capacity: u64,
    pub namespace: String,
    pub embedding_ttl_days: u64,
    pub semantic_ttl_hours: u64,
    pub semantic_enabled: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            backend: "memory".to_string(),
            redis_url: None,
            key_prefix: None,
            max_capacity: 10_000,
            namespace: "rag".to_string(),
            embedding_ttl_days: 7,
            semantic_ttl_hours: 24,
            semantic_enabled: true,
        }
    }
}

impl CacheSettings {
    /// Cache store configuration for [`CacheFactory`](crate::infrastructure::cache::CacheFactory)
    pub fn store_config(&self) -> Result<CacheConfig, crate::domain::DomainError> {
        let cache_type: CacheType = self.backend.parse()?;

        let mut config = match cache_type {
            CacheType::InMemory => CacheConfig::in_memory(),
            CacheType::Redis => {
                let url = self.redis_url.clone().ok_or_else(|| {
                    crate::domain::DomainError::configuration(
                        "cache.redis_url is required for the redis backend",
                    )
                })?;
                CacheConfig::redis(url)
            }
        }
        .with_max_capacity(self.max_capacity);

        if let Some(prefix) = &self.key_prefix {
            config = config.with_key_prefix(prefix.clone());
        }

        Ok(config)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_ms: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".to_string(),
            api_key: None,
            model: "text-embedding-3-small".to_string(),
            timeout_ms: 10_000,
        }
    }
}

impl EmbeddingSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub simple_model: String,
    pub complex_model: String,
    pub system_prompt: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub connect_timeout_ms: u64,
    pub timeout_ms: u64,
    pub stream_idle_timeout_ms: u64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".to_string(),
            api_key: None,
            simple_model: "gpt-4o-mini".to_string(),
            complex_model: "gpt-4o".to_string(),
            system_prompt: None,
            temperature: None,
            max_tokens: None,
            connect_timeout_ms: 5_000,
            timeout_ms: 60_000,
            stream_idle_timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    pub database_url: Option<String>,
    /// JSON file of items loaded into the in-memory store
    pub fixture_path: Option<String>,
    pub table_name: String,
    pub max_connections: u32,
    /// Create the table and indexes on startup
    pub ensure_schema: bool,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            database_url: None,
            fixture_path: None,
            table_name: "searchable_items".to_string(),
            max_connections: 10,
            ensure_schema: true,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let app: Self = config.try_deserialize()?;
        app.validate()
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;

        Ok(app)
    }

    /// Rejects values the pipeline cannot run with
    pub fn validate(&self) -> Result<(), crate::domain::DomainError> {
        HybridConfig::new(self.retrieval.alpha)?;

        if self.retrieval.top_k == 0 {
            return Err(crate::domain::DomainError::validation(
                "retrieval.top_k must be at least 1",
            ));
        }

        self.cache.store_config()?;

        if self.store.backend == StoreBackend::Postgres && self.store.database_url.is_none() {
            return Err(crate::domain::DomainError::configuration(
                "store.database_url is required for the postgres backend",
            ));
        }

        Ok(())
    }
}
