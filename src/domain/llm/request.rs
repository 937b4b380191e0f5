use serde::{Deserialize, Serialize};

use super::ConversationTurn;
use crate::domain::routing::ModelTier;

/// Parameters for a generation call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub tier: ModelTier,
    pub system_prompt: String,
    /// Trimmed conversation tail. Already rendered into `context`; providers
    /// with native multi-turn support may send it as separate messages instead.
    pub history: Vec<ConversationTurn>,
    /// Context block assembled from retrieved items and the conversation tail
    pub context: String,
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl GenerationRequest {
    pub fn new(tier: ModelTier, query: impl Into<String>) -> Self {
        Self {
            tier,
            system_prompt: String::new(),
            history: Vec::new(),
            context: String::new(),
            query: query.into(),
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_history(mut self, history: Vec<ConversationTurn>) -> Self {
        self.history = history;
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}
