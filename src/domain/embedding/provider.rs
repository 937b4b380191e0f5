//! Embedding provider trait definition

use async_trait::async_trait;
use std::fmt::Debug;

use super::{EmbeddingRequest, EmbeddingResponse};
use crate::domain::DomainError;

/// Turns text into fixed-dimension vectors
#[async_trait]
pub trait EmbeddingProvider: Send + Sync + Debug {
    /// Embed every input of the request. The response holds one vector per input.
    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, DomainError>;

    fn provider_name(&self) -> &'static str;

    /// Model used when the request does not name one
    fn model(&self) -> &str;

    /// Vector dimensions produced by `model`, if known
    fn dimensions(&self) -> Option<usize>;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use crate::domain::embedding::{l2_normalize, Embedding};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Bag-of-words embedder: each lowercase token lands in a hashed bucket
    ///
    /// Texts sharing words get a positive cosine similarity, which is
    /// enough to exercise ranking without a real model.
    #[derive(Debug)]
    pub struct MockEmbeddingProvider {
        dimensions: usize,
        error: Option<String>,
        delay: Option<Duration>,
        calls: AtomicUsize,
    }

    impl MockEmbeddingProvider {
        pub const DIMENSIONS: usize = 64;

        pub fn new() -> Self {
            Self {
                dimensions: Self::DIMENSIONS,
                error: None,
                delay: None,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn with_error(mut self, error: impl Into<String>) -> Self {
            self.error = Some(error.into());
            self
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        /// Number of `embed` calls served, including failed ones
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        /// Vector the mock produces for `text`, for seeding fixtures
        pub fn vector_for(text: &str) -> Vec<f32> {
            let mut vector = vec![0.0; Self::DIMENSIONS];

            for token in text
                .split(|c: char| !c.is_alphanumeric())
                .filter(|t| !t.is_empty())
            {
                let token = token.to_lowercase();
                // FNV-1a
                let hash = token.bytes().fold(0xcbf29ce484222325u64, |acc, b| {
                    (acc ^ b as u64).wrapping_mul(0x100000001b3)
                });
                vector[(hash % Self::DIMENSIONS as u64) as usize] += 1.0;
            }

            l2_normalize(&mut vector);
            vector
        }
    }

    impl Default for MockEmbeddingProvider {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl EmbeddingProvider for MockEmbeddingProvider {
        async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, DomainError> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            if let Some(ref error) = self.error {
                return Err(DomainError::embedding(error.clone()));
            }

            let embeddings = request
                .inputs()
                .iter()
                .enumerate()
                .map(|(idx, text)| Embedding::new(idx, Self::vector_for(text)))
                .collect();

            Ok(EmbeddingResponse::new(self.model(), embeddings))
        }

        fn provider_name(&self) -> &'static str {
            "mock"
        }

        fn model(&self) -> &str {
            "mock-embedding"
        }

        fn dimensions(&self) -> Option<usize> {
            Some(self.dimensions)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::domain::embedding::cosine_similarity;

        #[tokio::test]
        async fn test_mock_provider_batch_input() {
            let provider = MockEmbeddingProvider::new();
            let request = EmbeddingRequest::batch(vec!["Villa Mar".into(), "pool hours".into()]);

            let response = provider.embed(request).await.unwrap();

            assert_eq!(response.embeddings().len(), 2);
            assert_eq!(response.embeddings()[0].vector().len(), 64);
            assert_eq!(provider.calls(), 1);
        }

        #[tokio::test]
        async fn test_mock_provider_error() {
            let provider = MockEmbeddingProvider::new().with_error("API error");

            let result = provider.embed(EmbeddingRequest::single("Hello")).await;

            assert!(matches!(result, Err(DomainError::Embedding { .. })));
        }

        #[test]
        fn test_shared_words_are_similar() {
            let villa = MockEmbeddingProvider::vector_for("3 bedroom villa with pool");
            let query = MockEmbeddingProvider::vector_for("villa 3 bedroom");
            let unrelated = MockEmbeddingProvider::vector_for("parking garage levels");

            assert!(cosine_similarity(&villa, &query) > cosine_similarity(&villa, &unrelated));
            assert_eq!(villa, MockEmbeddingProvider::vector_for("3 Bedroom Villa with pool"));
        }
    }
}
