//! Generation provider implementations

mod http_client;
mod openai;
mod sse;

pub use http_client::{ByteStream, HttpClient, HttpClientTrait, HttpError};
pub use openai::{OpenAiGenerationProvider, TierModels};
pub use sse::SseDecoder;

#[cfg(test)]
pub use http_client::mock::MockHttpClient;
