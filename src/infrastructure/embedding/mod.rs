//! Embedding provider implementations and the embedding cache

mod cached;
mod openai;

pub use cached::{EmbeddingCache, EmbeddingCacheConfig};
pub use openai::OpenAiEmbeddingProvider;
