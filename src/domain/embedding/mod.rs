//! Embedding provider domain models and traits

mod provider;
mod request;
mod response;
mod vector;

pub use provider::EmbeddingProvider;
pub use request::{EmbeddingInput, EmbeddingRequest};
pub use response::{Embedding, EmbeddingResponse};
pub use vector::{cosine_similarity, l2_normalize};

#[cfg(test)]
pub use provider::mock::MockEmbeddingProvider;
