use async_trait::async_trait;
use futures::Stream;
use std::fmt::Debug;
use std::pin::Pin;

use super::{GenerationRequest, GenerationResponse, StreamChunk};
use crate::domain::DomainError;

/// Stream type for generation responses
pub type GenerationStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, DomainError>> + Send>>;

/// Trait for text generation services
///
/// Retries, if any, are the implementation's concern; callers apply their
/// own bounded timeout and never retry.
#[async_trait]
pub trait GenerationProvider: Send + Sync + Debug {
    /// Generate a complete answer
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, DomainError>;

    /// Generate an answer as a stream of text chunks
    async fn generate_stream(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationStream, DomainError>;

    /// Get the provider name
    fn provider_name(&self) -> &'static str;
}
