use thiserror::Error;

use super::pipeline::PipelineStage;

/// Core domain errors
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Embedding error: {message}")]
    Embedding { message: String },

    #[error("Index unavailable: {index} - {message}")]
    IndexUnavailable { index: String, message: String },

    #[error("Generation error: {message}")]
    Generation { message: String },

    #[error("Cache error: {message}")]
    Cache { message: String },

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DomainError {
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding {
            message: message.into(),
        }
    }

    pub fn index_unavailable(index: impl Into<String>, message: impl Into<String>) -> Self {
        Self::IndexUnavailable {
            index: index.into(),
            message: message.into(),
        }
    }

    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation {
            message: message.into(),
        }
    }

    pub fn cache(message: impl Into<String>) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether the pipeline may continue after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Cache { .. } | Self::IndexUnavailable { .. })
    }
}

/// Fatal errors surfaced by the generation orchestrator
///
/// The `Display` output and `user_message` are safe to show to end users;
/// the wrapped [`DomainError`] is only reachable through `source()`.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("embedding stage failed")]
    Embedding(#[source] DomainError),

    #[error("retrieval stage failed: no search index available")]
    Retrieval {
        vector: DomainError,
        #[source]
        keyword: DomainError,
    },

    #[error("generation stage failed")]
    Generation(#[source] DomainError),
}

impl PipelineError {
    /// Stage the request was in when it failed
    pub fn stage(&self) -> PipelineStage {
        match self {
            Self::Embedding(_) | Self::Retrieval { .. } => PipelineStage::Retrieve,
            Self::Generation(_) => PipelineStage::Generate,
        }
    }

    /// Generic message for the caller
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Embedding(_) => "The question could not be processed right now. Please try again.",
            Self::Retrieval { .. } => "The knowledge base is temporarily unavailable. Please try again.",
            Self::Generation(_) => "The answer could not be generated. Please try again.",
        }
    }

    /// Short tag identifying the failure kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Embedding(_) => "embedding_error",
            Self::Retrieval { .. } => "retrieval_error",
            Self::Generation(_) => "generation_error",
        }
    }
}
