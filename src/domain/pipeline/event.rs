use serde::{Deserialize, Serialize};

use super::PipelineStage;
use crate::domain::item::Source;
use crate::domain::routing::ModelTier;

/// Result of a non-streaming answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerResponse {
    pub response: String,
    pub sources: Vec<Source>,
    pub model_tier: ModelTier,
    pub cached: bool,
    pub latency_ms: u64,
}

/// Events of a streaming answer
///
/// A stream is `Sources`, any number of `Content`, then `Done`; or a single
/// `Error` that ends it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Sources {
        sources: Vec<Source>,
    },
    Content {
        delta: String,
    },
    Done {
        model_tier: ModelTier,
        cached: bool,
        latency_ms: u64,
    },
    Error {
        stage: PipelineStage,
        message: String,
    },
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Error { .. })
    }
}
