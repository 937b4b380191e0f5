//! PMP Knowledge RAG
//!
//! Retrieval-augmented answers over a multi-tenant knowledge base:
//! - Hybrid vector + keyword retrieval with tenant and role visibility
//! - Embedding and semantic answer caching (in-memory or Redis)
//! - Heuristic routing between simple and complex model tiers
//! - Batch and streaming generation with cancellation

pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::info;

use config::StoreBackend;
use domain::embedding::EmbeddingProvider;
use domain::retrieval::HybridConfig;
use domain::routing::KeywordModelRouter;
use domain::search::ItemStore;
use domain::semantic_cache::SemanticCacheConfig;
use infrastructure::cache::CacheFactory;
use infrastructure::embedding::{EmbeddingCache, EmbeddingCacheConfig, OpenAiEmbeddingProvider};
use infrastructure::llm::{HttpClient, OpenAiGenerationProvider, TierModels};
use infrastructure::search::{
    IndexKeywordSearch, IndexVectorSearch, InMemoryItemStore, PostgresItemStore,
    PostgresStoreConfig,
};
use infrastructure::services::{
    GenerationOrchestrator, OrchestratorConfig, OrchestratorDeps, SemanticCacheService,
};
use infrastructure::stats::RetrievalStatsTracker;

/// Dimensions assumed when the embedding model is not a known one
const FALLBACK_DIMENSIONS: usize = 1536;

/// Build the answer pipeline with every backend configured in `config`
pub async fn build_orchestrator(config: &AppConfig) -> anyhow::Result<GenerationOrchestrator> {
    config.validate()?;

    let cache = CacheFactory::new()
        .create(&config.cache.store_config()?)
        .await?;
    info!("Cache backend: {}", config.cache.backend);

    let embedder = create_embedding_provider(config)?;
    let store = create_item_store(config, embedder.as_ref()).await?;
    info!("Item store backend: {}", store.store_type());

    let search_timeout = config.retrieval.search_timeout();
    let embeddings = EmbeddingCache::with_config(
        embedder,
        cache.clone(),
        EmbeddingCacheConfig::default()
            .with_namespace(config.cache.namespace.clone())
            .with_ttl_days(config.cache.embedding_ttl_days)
            .with_timeout(config.embedding.timeout()),
    );

    let semantic_cache = SemanticCacheService::with_config(
        cache,
        SemanticCacheConfig::new()
            .with_enabled(config.cache.semantic_enabled)
            .with_ttl_hours(config.cache.semantic_ttl_hours)
            .with_namespace(config.cache.namespace.clone()),
    );

    let deps = OrchestratorDeps {
        embeddings,
        vector_search: Arc::new(IndexVectorSearch::new(store.clone()).with_timeout(search_timeout)),
        keyword_search: Arc::new(
            IndexKeywordSearch::new(store.clone()).with_timeout(search_timeout),
        ),
        stats: RetrievalStatsTracker::new(store),
        semantic_cache,
        router: Arc::new(KeywordModelRouter::new(&config.routing.trigger_terms)?),
        generator: create_generation_provider(config)?,
    };

    let generation = &config.generation;
    let mut orchestrator_config = OrchestratorConfig {
        hybrid: HybridConfig::new(config.retrieval.alpha)?,
        top_k: config.retrieval.top_k,
        overfetch_factor: config.retrieval.overfetch_factor,
        history_turns: config.context.history_turns,
        temperature: generation.temperature,
        max_tokens: generation.max_tokens,
        generation_timeout: Duration::from_millis(generation.timeout_ms),
        stream_idle_timeout: Duration::from_millis(generation.stream_idle_timeout_ms),
        ..OrchestratorConfig::default()
    };
    if let Some(prompt) = &generation.system_prompt {
        orchestrator_config.system_prompt = prompt.clone();
    }

    Ok(GenerationOrchestrator::new(deps, orchestrator_config))
}

fn create_embedding_provider(config: &AppConfig) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
    let settings = &config.embedding;
    let api_key = settings
        .api_key
        .clone()
        .context("embedding.api_key is required (APP__EMBEDDING__API_KEY)")?;

    let client = HttpClient::with_timeout(settings.timeout())?;
    let provider = OpenAiEmbeddingProvider::with_base_url(client, api_key, &settings.base_url)
        .with_model(&settings.model);

    Ok(Arc::new(provider))
}

fn create_generation_provider(
    config: &AppConfig,
) -> anyhow::Result<Arc<dyn domain::llm::GenerationProvider>> {
    let settings = &config.generation;
    let api_key = settings
        .api_key
        .clone()
        .context("generation.api_key is required (APP__GENERATION__API_KEY)")?;

    // Streams outlive any whole-request timeout; the orchestrator bounds them instead
    let client = HttpClient::with_connect_timeout(Duration::from_millis(settings.connect_timeout_ms))?;
    let models = TierModels::new(&settings.simple_model, &settings.complex_model);

    Ok(Arc::new(OpenAiGenerationProvider::with_base_url(
        client,
        api_key,
        &settings.base_url,
        models,
    )))
}

async fn create_item_store(
    config: &AppConfig,
    embedder: &dyn EmbeddingProvider,
) -> anyhow::Result<Arc<dyn ItemStore>> {
    let settings = &config.store;

    match settings.backend {
        StoreBackend::Memory => {
            let store = match &settings.fixture_path {
                Some(path) => InMemoryItemStore::from_fixture_file(path).await?,
                None => InMemoryItemStore::new(),
            };

            let embedded = store.embed_missing(embedder).await?;
            info!(items = store.len().await, embedded, "Loaded in-memory item store");

            Ok(Arc::new(store))
        }
        StoreBackend::Postgres => {
            let url = settings
                .database_url
                .as_deref()
                .context("store.database_url is required for the postgres backend")?;

            let store_config =
                PostgresStoreConfig::new(embedder.dimensions().unwrap_or(FALLBACK_DIMENSIONS))
                    .with_table_name(&settings.table_name)
                    .with_max_connections(settings.max_connections);

            info!("Connecting to PostgreSQL...");
            let store = PostgresItemStore::connect(url, store_config).await?;
            if settings.ensure_schema {
                store.ensure_schema().await?;
            }
            info!("PostgreSQL connection established");

            Ok(Arc::new(store))
        }
    }
}
