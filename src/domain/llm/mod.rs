//! Generation service domain models and traits

mod message;
mod provider;
mod request;
mod response;

pub use message::{last_turns, ConversationTurn, TurnRole};
pub use provider::{GenerationProvider, GenerationStream};
pub use request::GenerationRequest;
pub use response::{FinishReason, GenerationResponse, StreamChunk, Usage};

#[cfg(test)]
pub use provider::mock::MockGenerationProvider;
