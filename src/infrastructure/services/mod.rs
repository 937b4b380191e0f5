//! Infrastructure services

mod orchestrator;
mod semantic_cache_service;

pub use orchestrator::{AnswerStream, GenerationOrchestrator, OrchestratorConfig, OrchestratorDeps};
pub use semantic_cache_service::SemanticCacheService;
