//! Domain layer - Core retrieval and generation entities

pub mod cache;
pub mod context;
pub mod embedding;
pub mod error;
pub mod item;
pub mod llm;
pub mod pipeline;
pub mod retrieval;
pub mod routing;
pub mod search;
pub mod semantic_cache;

pub use cache::{normalize_query, Cache, CacheExt, HashedKeyBuilder};
pub use context::ContextBuilder;
pub use embedding::{EmbeddingProvider, EmbeddingRequest, EmbeddingResponse};
pub use error::{DomainError, PipelineError};
pub use item::{
    Document, ItemKey, ItemKind, ScoredResult, SearchableItem, Source, StructuredRecord,
};
pub use llm::{
    ConversationTurn, FinishReason, GenerationProvider, GenerationRequest, GenerationResponse,
    GenerationStream, StreamChunk, TurnRole,
};
pub use pipeline::{AnswerResponse, PipelineStage, RequestState, StreamEvent};
pub use retrieval::{HybridCombiner, HybridConfig};
pub use routing::{KeywordModelRouter, ModelRouter, ModelTier};
pub use search::{AccessScope, ItemStats, ItemStore, KeywordSearch, SearchHit, VectorSearch};
pub use semantic_cache::{CachedAnswer, SemanticCacheConfig, SemanticCacheStats};
