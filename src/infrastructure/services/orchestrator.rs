//! Answer pipeline: cache check, hybrid retrieval, context, generation, cache store

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, instrument, warn, Instrument};

use crate::domain::context::{ContextBuilder, DEFAULT_HISTORY_TURNS};
use crate::domain::item::{ScoredResult, Source};
use crate::domain::llm::{ConversationTurn, GenerationProvider, GenerationRequest};
use crate::domain::pipeline::{AnswerResponse, PipelineStage, RequestState, StreamEvent};
use crate::domain::retrieval::{HybridCombiner, HybridConfig};
use crate::domain::routing::{ModelRouter, ModelTier};
use crate::domain::search::{AccessScope, KeywordSearch, VectorSearch};
use crate::domain::semantic_cache::CachedAnswer;
use crate::domain::{DomainError, PipelineError};
use crate::infrastructure::embedding::EmbeddingCache;
use crate::infrastructure::observability::{
    record_answer, record_retrieval_degraded, AnswerMetricParams,
};
use crate::infrastructure::stats::RetrievalStatsTracker;

use super::SemanticCacheService;

/// Stream of answer events; ends after `Done` or `Error`
pub type AnswerStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

const STREAM_BUFFER: usize = 32;

/// Tuning of the answer pipeline
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub hybrid: HybridConfig,
    /// Results kept after fusion
    pub top_k: usize,
    /// Each backend is asked for `top_k * overfetch_factor` hits
    pub overfetch_factor: usize,
    pub history_turns: usize,
    pub system_prompt: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// Bound on a complete generation, or on opening a stream
    pub generation_timeout: Duration,
    /// Longest wait between two stream chunks
    pub stream_idle_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            hybrid: HybridConfig::default(),
            top_k: 5,
            overfetch_factor: 2,
            history_turns: DEFAULT_HISTORY_TURNS,
            system_prompt: "You are a helpful real-estate assistant. Answer using only the \
                            retrieved context and say so when it does not contain the answer."
                .to_string(),
            temperature: None,
            max_tokens: None,
            generation_timeout: Duration::from_secs(60),
            stream_idle_timeout: Duration::from_secs(30),
        }
    }
}

/// Collaborators of the orchestrator
#[derive(Debug, Clone)]
pub struct OrchestratorDeps {
    pub embeddings: EmbeddingCache,
    pub vector_search: Arc<dyn VectorSearch>,
    pub keyword_search: Arc<dyn KeywordSearch>,
    pub stats: RetrievalStatsTracker,
    pub semantic_cache: SemanticCacheService,
    pub router: Arc<dyn ModelRouter>,
    pub generator: Arc<dyn GenerationProvider>,
}

/// Everything a cache miss needs before the generation call
struct Prepared {
    sources: Vec<Source>,
    tier: ModelTier,
    request: GenerationRequest,
}

/// Drives one request through the stage machine
///
/// Cheap to clone; every clone shares the same caches and backends.
#[derive(Debug, Clone)]
pub struct GenerationOrchestrator {
    deps: OrchestratorDeps,
    combiner: HybridCombiner,
    context: ContextBuilder,
    config: Arc<OrchestratorConfig>,
}

impl GenerationOrchestrator {
    pub fn new(deps: OrchestratorDeps, config: OrchestratorConfig) -> Self {
        Self {
            combiner: HybridCombiner::new(config.hybrid),
            context: ContextBuilder::new(config.history_turns),
            config: Arc::new(config),
            deps,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn semantic_cache(&self) -> &SemanticCacheService {
        &self.deps.semantic_cache
    }

    /// Answers `query` for the caller identified by `tenant_id` and `role`
    #[instrument(skip(self, query, history), fields(tenant_id = %tenant_id, role = %role))]
    pub async fn answer(
        &self,
        tenant_id: &str,
        role: &str,
        query: &str,
        history: &[ConversationTurn],
    ) -> Result<AnswerResponse, PipelineError> {
        let mut state = RequestState::new();
        let scope = AccessScope::new(tenant_id, role);

        advance(&mut state, PipelineStage::CacheCheck);
        if let Some(hit) = self.deps.semantic_cache.lookup(tenant_id, role, query).await {
            advance(&mut state, PipelineStage::Completed);
            return Ok(self.cached_response(&state, hit));
        }

        advance(&mut state, PipelineStage::Retrieve);
        let prepared = match self.prepare(&mut state, &scope, query, history).await {
            Ok(prepared) => prepared,
            Err(e) => return Err(self.fail(&mut state, None, e)),
        };

        advance(&mut state, PipelineStage::Generate);
        let generated = tokio::time::timeout(
            self.config.generation_timeout,
            self.deps.generator.generate(prepared.request),
        )
        .await
        .map_err(|_| self.generation_timeout())
        .and_then(|result| result)
        .and_then(|response| {
            if response.text.trim().is_empty() {
                Err(DomainError::generation("Generation returned an empty answer"))
            } else {
                Ok(response)
            }
        });

        let response = match generated {
            Ok(response) => response,
            Err(e) => {
                return Err(self.fail(&mut state, Some(prepared.tier), PipelineError::Generation(e)))
            }
        };

        advance(&mut state, PipelineStage::CacheStore);
        self.deps
            .semantic_cache
            .store(tenant_id, role, query, &response.text, &prepared.sources, prepared.tier)
            .await;

        advance(&mut state, PipelineStage::Completed);
        self.record(&state, Some(prepared.tier), false, true);

        Ok(AnswerResponse {
            response: response.text,
            sources: prepared.sources,
            model_tier: prepared.tier,
            cached: false,
            latency_ms: state.elapsed_ms(),
        })
    }

    /// Streaming variant of [`answer`](Self::answer)
    ///
    /// Work runs on a spawned task. Dropping the returned stream cancels it:
    /// no further chunks are pulled from the generator and nothing is cached.
    pub fn answer_stream(
        &self,
        tenant_id: impl Into<String>,
        role: impl Into<String>,
        query: impl Into<String>,
        history: Vec<ConversationTurn>,
    ) -> AnswerStream {
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let scope = AccessScope::new(tenant_id, role);
        let query = query.into();
        let span = tracing::info_span!(
            "answer_stream",
            tenant_id = %scope.tenant_id,
            role = %scope.role
        );

        let this = self.clone();
        tokio::spawn(
            async move {
                this.run_stream(tx, scope, query, history).await;
            }
            .instrument(span),
        );

        Box::pin(ReceiverStream::new(rx))
    }

    async fn run_stream(
        &self,
        tx: mpsc::Sender<StreamEvent>,
        scope: AccessScope,
        query: String,
        history: Vec<ConversationTurn>,
    ) {
        let mut state = RequestState::new();
        let (tenant_id, role) = (scope.tenant_id.as_str(), scope.role.as_str());

        advance(&mut state, PipelineStage::CacheCheck);
        if let Some(hit) = self.deps.semantic_cache.lookup(tenant_id, role, &query).await {
            advance(&mut state, PipelineStage::Completed);
            let tier = hit.model_tier;
            let events = [
                StreamEvent::Sources {
                    sources: hit.sources,
                },
                StreamEvent::Content {
                    delta: hit.response,
                },
            ];
            for event in events {
                if tx.send(event).await.is_err() {
                    debug!("Client disconnected during cached replay");
                    return;
                }
            }
            self.record(&state, Some(tier), true, true);
            let _ = tx
                .send(StreamEvent::Done {
                    model_tier: tier,
                    cached: true,
                    latency_ms: state.elapsed_ms(),
                })
                .await;
            return;
        }

        advance(&mut state, PipelineStage::Retrieve);
        let prepared = match self.prepare(&mut state, &scope, &query, &history).await {
            Ok(prepared) => prepared,
            Err(e) => {
                let error = self.fail(&mut state, None, e);
                send_error(&tx, &error).await;
                return;
            }
        };
        let tier = prepared.tier;

        if tx
            .send(StreamEvent::Sources {
                sources: prepared.sources.clone(),
            })
            .await
            .is_err()
        {
            debug!("Client disconnected before generation");
            return;
        }

        advance(&mut state, PipelineStage::Generate);
        let opened = tokio::time::timeout(
            self.config.generation_timeout,
            self.deps.generator.generate_stream(prepared.request),
        )
        .await
        .map_err(|_| self.generation_timeout())
        .and_then(|result| result);

        let mut chunks = match opened {
            Ok(chunks) => chunks,
            Err(e) => {
                let error = self.fail(&mut state, Some(tier), PipelineError::Generation(e));
                send_error(&tx, &error).await;
                return;
            }
        };

        let mut answer = String::new();
        loop {
            let next = tokio::select! {
                biased;
                _ = tx.closed() => {
                    debug!(received = answer.len(), "Client disconnected, abandoning generation");
                    return;
                }
                next = tokio::time::timeout(self.config.stream_idle_timeout, chunks.next()) => next,
            };

            let chunk = match next {
                Ok(Some(Ok(chunk))) => chunk,
                Ok(None) => break,
                Ok(Some(Err(e))) => {
                    let error = self.fail(&mut state, Some(tier), PipelineError::Generation(e));
                    send_error(&tx, &error).await;
                    return;
                }
                Err(_) => {
                    let e = DomainError::generation(format!(
                        "No stream chunk within {}ms",
                        self.config.stream_idle_timeout.as_millis()
                    ));
                    let error = self.fail(&mut state, Some(tier), PipelineError::Generation(e));
                    send_error(&tx, &error).await;
                    return;
                }
            };

            if let Some(delta) = chunk.delta.filter(|d| !d.is_empty()) {
                answer.push_str(&delta);
                if tx.send(StreamEvent::Content { delta }).await.is_err() {
                    debug!("Client disconnected, abandoning generation");
                    return;
                }
            }
        }
        drop(chunks);

        if answer.trim().is_empty() {
            let e = DomainError::generation("Generation returned an empty answer");
            let error = self.fail(&mut state, Some(tier), PipelineError::Generation(e));
            send_error(&tx, &error).await;
            return;
        }

        if tx.is_closed() {
            debug!("Client disconnected before completion, answer not cached");
            return;
        }

        advance(&mut state, PipelineStage::CacheStore);
        self.deps
            .semantic_cache
            .store(tenant_id, role, &query, &answer, &prepared.sources, tier)
            .await;

        advance(&mut state, PipelineStage::Completed);
        self.record(&state, Some(tier), false, true);
        let _ = tx
            .send(StreamEvent::Done {
                model_tier: tier,
                cached: false,
                latency_ms: state.elapsed_ms(),
            })
            .await;
    }

    /// Retrieve, build the context and pick the model tier
    async fn prepare(
        &self,
        state: &mut RequestState,
        scope: &AccessScope,
        query: &str,
        history: &[ConversationTurn],
    ) -> Result<Prepared, PipelineError> {
        let results = self.retrieve(scope, query).await?;
        let sources: Vec<Source> = results.iter().map(ScoredResult::snapshot).collect();

        advance(state, PipelineStage::BuildContext);
        let trimmed = self.context.trim_history(history);
        let context = self.context.build(&results, trimmed);

        advance(state, PipelineStage::RouteModel);
        let tier = self.deps.router.select_tier(query);
        debug!(tier = tier.as_str(), sources = sources.len(), "Routed request");

        let request = GenerationRequest::new(tier, query)
            .with_system_prompt(self.config.system_prompt.clone())
            .with_history(trimmed.to_vec())
            .with_context(context)
            .with_temperature(self.config.temperature)
            .with_max_tokens(self.config.max_tokens);

        Ok(Prepared {
            sources,
            tier,
            request,
        })
    }

    /// Vector (after embedding) and keyword search run concurrently, then fuse
    async fn retrieve(
        &self,
        scope: &AccessScope,
        query: &str,
    ) -> Result<Vec<ScoredResult>, PipelineError> {
        let top_k = self.config.top_k;
        let fetch = top_k.saturating_mul(self.config.overfetch_factor.max(1));

        let vector_branch = async {
            let vector = self.deps.embeddings.get_or_compute(query).await?;
            Ok::<_, DomainError>(self.deps.vector_search.search(scope, &vector, fetch).await)
        };
        let keyword_branch = self.deps.keyword_search.search(scope, query, fetch);

        let (vector, keyword) = tokio::join!(vector_branch, keyword_branch);
        let vector = vector.map_err(PipelineError::Embedding)?;

        let (vector_hits, keyword_hits) = match (vector, keyword) {
            (Ok(v), Ok(k)) => (v, k),
            (Err(e), Ok(k)) => {
                warn!(error = %e, "Vector index unavailable, using keyword results only");
                record_retrieval_degraded("vector");
                (Vec::new(), k)
            }
            (Ok(v), Err(e)) => {
                warn!(error = %e, "Keyword index unavailable, using vector results only");
                record_retrieval_degraded("keyword");
                (v, Vec::new())
            }
            (Err(vector), Err(keyword)) => {
                return Err(PipelineError::Retrieval { vector, keyword });
            }
        };

        let results = self.combiner.combine(vector_hits, keyword_hits, top_k);
        self.deps.stats.record_all(&scope.tenant_id, &results);

        Ok(results)
    }

    fn cached_response(&self, state: &RequestState, hit: CachedAnswer) -> AnswerResponse {
        self.record(state, Some(hit.model_tier), true, true);

        AnswerResponse {
            response: hit.response,
            sources: hit.sources,
            model_tier: hit.model_tier,
            cached: true,
            latency_ms: state.elapsed_ms(),
        }
    }

    fn generation_timeout(&self) -> DomainError {
        DomainError::generation(format!(
            "Generation timed out after {}ms",
            self.config.generation_timeout.as_millis()
        ))
    }

    fn fail(
        &self,
        state: &mut RequestState,
        tier: Option<ModelTier>,
        error: PipelineError,
    ) -> PipelineError {
        let cause = std::error::Error::source(&error)
            .map(ToString::to_string)
            .unwrap_or_default();
        tracing::error!(
            stage = %error.stage(),
            kind = error.kind(),
            cause = %cause,
            "Answer pipeline failed"
        );
        state.fail();
        self.record(state, tier, false, false);
        error
    }

    fn record(&self, state: &RequestState, tier: Option<ModelTier>, cached: bool, success: bool) {
        record_answer(AnswerMetricParams {
            tier,
            cached,
            success,
            duration: Duration::from_millis(state.elapsed_ms()),
        });
    }
}

fn advance(state: &mut RequestState, next: PipelineStage) {
    if let Err(e) = state.advance(next) {
        tracing::error!(error = %e, "Invalid pipeline transition");
    }
}

async fn send_error(tx: &mpsc::Sender<StreamEvent>, error: &PipelineError) {
    let _ = tx
        .send(StreamEvent::Error {
            stage: error.stage(),
            message: error.user_message().to_string(),
        })
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cache::{Cache, MockCache};
    use crate::domain::embedding::MockEmbeddingProvider;
    use crate::domain::llm::MockGenerationProvider;
    use crate::domain::routing::KeywordModelRouter;
    use crate::domain::search::UnavailableIndex;
    use crate::domain::semantic_cache::SemanticCacheConfig;
    use crate::infrastructure::cache::InMemoryCache;
    use crate::infrastructure::search::{
        fixtures, IndexKeywordSearch, IndexVectorSearch, InMemoryItemStore,
    };

    const ANSWER: &str = "Villa Mar has 3 bedrooms and costs 290000 EUR.";

    struct Harness {
        orchestrator: GenerationOrchestrator,
        generator: Arc<MockGenerationProvider>,
        store: Arc<InMemoryItemStore>,
    }

    struct HarnessBuilder {
        generator: MockGenerationProvider,
        embedder: MockEmbeddingProvider,
        vector_down: bool,
        keyword_down: bool,
        semantic_backend: Arc<dyn Cache>,
        semantic_config: SemanticCacheConfig,
    }

    impl HarnessBuilder {
        fn new() -> Self {
            Self {
                generator: MockGenerationProvider::new(ANSWER),
                embedder: MockEmbeddingProvider::new(),
                vector_down: false,
                keyword_down: false,
                semantic_backend: Arc::new(InMemoryCache::new()),
                semantic_config: SemanticCacheConfig::default(),
            }
        }

        fn generator(mut self, generator: MockGenerationProvider) -> Self {
            self.generator = generator;
            self
        }

        fn embedder(mut self, embedder: MockEmbeddingProvider) -> Self {
            self.embedder = embedder;
            self
        }

        fn vector_down(mut self) -> Self {
            self.vector_down = true;
            self
        }

        fn keyword_down(mut self) -> Self {
            self.keyword_down = true;
            self
        }

        fn semantic_backend(mut self, cache: Arc<dyn Cache>) -> Self {
            self.semantic_backend = cache;
            self
        }

        fn semantic_ttl(mut self, ttl: Duration) -> Self {
            self.semantic_config = self.semantic_config.with_ttl(ttl);
            self
        }

        fn build(self) -> Harness {
            let store = Arc::new(InMemoryItemStore::with_items(fixtures::items()));
            let generator = Arc::new(self.generator);

            let vector_search: Arc<dyn VectorSearch> = if self.vector_down {
                Arc::new(UnavailableIndex::new())
            } else {
                Arc::new(IndexVectorSearch::new(store.clone()))
            };
            let keyword_search: Arc<dyn KeywordSearch> = if self.keyword_down {
                Arc::new(UnavailableIndex::new())
            } else {
                Arc::new(IndexKeywordSearch::new(store.clone()))
            };

            let deps = OrchestratorDeps {
                embeddings: EmbeddingCache::new(
                    Arc::new(self.embedder),
                    Arc::new(InMemoryCache::new()),
                ),
                vector_search,
                keyword_search,
                stats: RetrievalStatsTracker::new(store.clone()),
                semantic_cache: SemanticCacheService::with_config(
                    self.semantic_backend,
                    self.semantic_config,
                ),
                router: Arc::new(KeywordModelRouter::with_default_terms()),
                generator: generator.clone(),
            };

            Harness {
                orchestrator: GenerationOrchestrator::new(deps, OrchestratorConfig::default()),
                generator,
                store,
            }
        }
    }

    async fn collect(stream: AnswerStream) -> Vec<StreamEvent> {
        stream.collect().await
    }

    fn content_of(events: &[StreamEvent]) -> String {
        events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::Content { delta } => Some(delta.as_str()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_villa_query_cached_on_repeat() {
        let h = HarnessBuilder::new().build();

        let first = h
            .orchestrator
            .answer(fixtures::TENANT, "buyer", fixtures::VILLA_QUERY, &[])
            .await
            .unwrap();

        assert!(!first.cached);
        assert_eq!(first.response, ANSWER);
        assert!(first.sources.len() <= 5);
        for id in fixtures::villa_matches() {
            assert!(first.sources.iter().any(|s| s.id == id), "missing source {}", id);
        }

        let second = h
            .orchestrator
            .answer(fixtures::TENANT, "buyer", fixtures::VILLA_QUERY, &[])
            .await
            .unwrap();

        assert!(second.cached);
        assert_eq!(second.response, first.response);
        assert_eq!(second.sources, first.sources);
        assert_eq!(h.generator.calls(), 1);
    }

    #[tokio::test]
    async fn test_both_indexes_down_fails_without_generation() {
        let h = HarnessBuilder::new().vector_down().keyword_down().build();

        let result = h
            .orchestrator
            .answer(fixtures::TENANT, "buyer", fixtures::VILLA_QUERY, &[])
            .await;

        let error = result.unwrap_err();
        assert!(matches!(error, PipelineError::Retrieval { .. }));
        assert_eq!(error.stage(), PipelineStage::Retrieve);
        assert_eq!(h.generator.calls(), 0);
        assert_eq!(h.orchestrator.semantic_cache().stats().stores, 0);
    }

    #[tokio::test]
    async fn test_vector_down_degrades_to_keyword() {
        let h = HarnessBuilder::new().vector_down().build();

        let response = h
            .orchestrator
            .answer(fixtures::TENANT, "buyer", fixtures::VILLA_QUERY, &[])
            .await
            .unwrap();

        assert!(!response.sources.is_empty());
        assert!(response.sources.iter().all(|s| s.vector_score == 0.0));
        assert_eq!(h.generator.calls(), 1);
    }

    #[tokio::test]
    async fn test_keyword_down_degrades_to_vector() {
        let h = HarnessBuilder::new().keyword_down().build();

        let response = h
            .orchestrator
            .answer(fixtures::TENANT, "buyer", fixtures::VILLA_QUERY, &[])
            .await
            .unwrap();

        assert!(!response.sources.is_empty());
        assert!(response.sources.iter().all(|s| s.keyword_score == 0.0));
    }

    #[tokio::test]
    async fn test_embedding_failure_is_fatal() {
        let h = HarnessBuilder::new()
            .embedder(MockEmbeddingProvider::new().with_error("quota exceeded"))
            .build();

        let result = h
            .orchestrator
            .answer(fixtures::TENANT, "buyer", "pool hours", &[])
            .await;

        assert!(matches!(result, Err(PipelineError::Embedding(_))));
        assert_eq!(h.generator.calls(), 0);
    }

    #[tokio::test]
    async fn test_identical_queries_are_idempotent() {
        let h = HarnessBuilder::new()
            .semantic_backend(Arc::new(MockCache::new().with_error("redis down")))
            .build();

        let first = h
            .orchestrator
            .answer(fixtures::TENANT, "buyer", fixtures::VILLA_QUERY, &[])
            .await
            .unwrap();
        let second = h
            .orchestrator
            .answer(fixtures::TENANT, "buyer", fixtures::VILLA_QUERY, &[])
            .await
            .unwrap();

        assert_eq!(first.response, second.response);
        assert_eq!(first.sources, second.sources);
    }

    #[tokio::test]
    async fn test_results_respect_role_visibility() {
        let h = HarnessBuilder::new().build();

        for role in ["buyer", "agent", "seller"] {
            let response = h
                .orchestrator
                .answer(fixtures::TENANT, role, "villa 3 bedroom commission", &[])
                .await
                .unwrap();

            for source in &response.sources {
                let visible = fixtures::items()
                    .into_iter()
                    .any(|item| item.id() == source.id && item.is_visible_to(fixtures::TENANT, role));
                assert!(visible, "{} leaked to {}", source.id, role);
            }
        }

        let seller = h
            .orchestrator
            .answer(fixtures::TENANT, "seller", "villa", &[])
            .await
            .unwrap();
        assert!(seller.sources.is_empty());
    }

    #[tokio::test]
    async fn test_generation_failure_is_not_cached() {
        let h = HarnessBuilder::new()
            .generator(MockGenerationProvider::new(ANSWER).with_error("model overloaded"))
            .build();

        for _ in 0..2 {
            let error = h
                .orchestrator
                .answer(fixtures::TENANT, "buyer", fixtures::VILLA_QUERY, &[])
                .await
                .unwrap_err();
            assert_eq!(error.stage(), PipelineStage::Generate);
            assert_eq!(error.to_string(), "generation stage failed");
        }

        assert_eq!(h.generator.calls(), 2);
        assert_eq!(h.orchestrator.semantic_cache().stats().stores, 0);
    }

    #[tokio::test]
    async fn test_cache_errors_do_not_fail_requests() {
        let h = HarnessBuilder::new()
            .semantic_backend(Arc::new(MockCache::new().with_error("connection refused")))
            .build();

        for _ in 0..2 {
            let response = h
                .orchestrator
                .answer(fixtures::TENANT, "buyer", "pool hours", &[])
                .await
                .unwrap();
            assert!(!response.cached);
        }

        assert_eq!(h.generator.calls(), 2);
    }

    #[tokio::test]
    async fn test_semantic_entry_expires() {
        let h = HarnessBuilder::new()
            .semantic_ttl(Duration::from_secs(1))
            .build();

        let ask = || h.orchestrator.answer(fixtures::TENANT, "buyer", "pool hours", &[]);

        assert!(!ask().await.unwrap().cached);
        assert!(ask().await.unwrap().cached);
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(!ask().await.unwrap().cached);
        assert_eq!(h.generator.calls(), 2);
    }

    #[tokio::test]
    async fn test_tier_routing_and_context_reach_generator() {
        let h = HarnessBuilder::new().build();
        let history: Vec<ConversationTurn> = (0..10)
            .map(|i| ConversationTurn::user(format!("turn {}", i)))
            .collect();

        let response = h
            .orchestrator
            .answer(fixtures::TENANT, "buyer", "What is the ROI on Villa Mar?", &history)
            .await
            .unwrap();
        assert_eq!(response.model_tier, ModelTier::Complex);

        let request = h.generator.last_request().unwrap();
        assert_eq!(request.tier, ModelTier::Complex);
        assert_eq!(request.history.len(), DEFAULT_HISTORY_TURNS);
        assert_eq!(request.history[0].content, "turn 4");
        assert!(request.context.contains("## Retrieved context"));
        assert!(request.context.contains("source: record:villa-mar"));

        let simple = h
            .orchestrator
            .answer(fixtures::TENANT, "buyer", "What time does the pool open?", &[])
            .await
            .unwrap();
        assert_eq!(simple.model_tier, ModelTier::Simple);
    }

    #[tokio::test]
    async fn test_surfaced_items_are_recorded() {
        let h = HarnessBuilder::new().build();

        let response = h
            .orchestrator
            .answer(fixtures::TENANT, "buyer", fixtures::VILLA_QUERY, &[])
            .await
            .unwrap();
        let top = response.sources[0].clone();
        let key = crate::domain::item::ItemKey::new(top.kind, top.id);

        for _ in 0..50 {
            if h.store.stats(fixtures::TENANT, &key).await.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let stats = h.store.stats(fixtures::TENANT, &key).await.unwrap();
        assert_eq!(stats.retrieval_count, 1);
        assert!((stats.mean_relevance - top.combined_score as f64).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_stream_event_order_then_cached_replay() {
        let h = HarnessBuilder::new().build();

        let events = collect(h.orchestrator.answer_stream(
            fixtures::TENANT,
            "buyer",
            fixtures::VILLA_QUERY,
            Vec::new(),
        ))
        .await;

        assert!(matches!(events.first(), Some(StreamEvent::Sources { sources }) if !sources.is_empty()));
        assert!(matches!(events.last(), Some(StreamEvent::Done { cached: false, .. })));
        assert!(events[1..events.len() - 1]
            .iter()
            .all(|e| matches!(e, StreamEvent::Content { .. })));
        assert_eq!(content_of(&events), ANSWER);

        let replay = collect(h.orchestrator.answer_stream(
            fixtures::TENANT,
            "buyer",
            fixtures::VILLA_QUERY,
            Vec::new(),
        ))
        .await;

        assert_eq!(replay.len(), 3);
        assert_eq!(replay[0], events[0]);
        assert_eq!(content_of(&replay), ANSWER);
        assert!(matches!(replay[2], StreamEvent::Done { cached: true, .. }));
        assert_eq!(h.generator.calls(), 1);
    }

    #[tokio::test]
    async fn test_stream_retrieval_failure_is_single_error_event() {
        let h = HarnessBuilder::new().vector_down().keyword_down().build();

        let events = collect(h.orchestrator.answer_stream(
            fixtures::TENANT,
            "buyer",
            "pool",
            Vec::new(),
        ))
        .await;

        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            StreamEvent::Error { stage: PipelineStage::Retrieve, .. }
        ));
    }

    #[tokio::test]
    async fn test_stream_generation_failure_ends_with_error_and_is_not_cached() {
        let h = HarnessBuilder::new()
            .generator(MockGenerationProvider::new(ANSWER).with_stream_error_after(2))
            .build();

        let events = collect(h.orchestrator.answer_stream(
            fixtures::TENANT,
            "buyer",
            "pool",
            Vec::new(),
        ))
        .await;

        assert!(matches!(events[0], StreamEvent::Sources { .. }));
        assert_eq!(events.len(), 4);
        assert!(matches!(
            events.last(),
            Some(StreamEvent::Error { stage: PipelineStage::Generate, .. })
        ));
        assert_eq!(h.orchestrator.semantic_cache().stats().stores, 0);
    }

    #[tokio::test]
    async fn test_stream_cancellation_stops_generation_and_skips_cache() {
        let words: Vec<&str> = vec!["word "; 50];
        let h = HarnessBuilder::new()
            .generator(
                MockGenerationProvider::new("")
                    .with_chunks(words)
                    .with_chunk_delay(Duration::from_millis(10)),
            )
            .build();

        let mut stream =
            h.orchestrator
                .answer_stream(fixtures::TENANT, "buyer", "pool", Vec::new());

        assert!(matches!(stream.next().await, Some(StreamEvent::Sources { .. })));
        assert!(matches!(stream.next().await, Some(StreamEvent::Content { .. })));
        drop(stream);

        tokio::time::sleep(Duration::from_millis(100)).await;
        let yielded = h.generator.chunks_yielded();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(yielded < 50);
        assert_eq!(h.generator.chunks_yielded(), yielded);
        assert_eq!(h.orchestrator.semantic_cache().stats().stores, 0);
        assert!(h
            .orchestrator
            .semantic_cache()
            .lookup(fixtures::TENANT, "buyer", "pool")
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_stream_idle_timeout() {
        let h = HarnessBuilder::new()
            .generator(
                MockGenerationProvider::new("slow answer")
                    .with_chunk_delay(Duration::from_millis(200)),
            )
            .build();
        let mut config = (*h.orchestrator.config).clone();
        config.stream_idle_timeout = Duration::from_millis(20);
        let orchestrator = GenerationOrchestrator::new(h.orchestrator.deps.clone(), config);

        let events = collect(orchestrator.answer_stream(
            fixtures::TENANT,
            "buyer",
            "pool",
            Vec::new(),
        ))
        .await;

        assert!(matches!(
            events.last(),
            Some(StreamEvent::Error { stage: PipelineStage::Generate, .. })
        ));
    }
}
