use async_trait::async_trait;
use futures::{stream, StreamExt};
use serde::{Deserialize, Serialize};

use super::http_client::HttpClientTrait;
use super::sse::SseDecoder;
use crate::domain::llm::{
    FinishReason, GenerationProvider, GenerationRequest, GenerationResponse, GenerationStream,
    StreamChunk, Usage,
};
use crate::domain::routing::ModelTier;
use crate::domain::DomainError;

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";

/// Model names backing each generation tier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierModels {
    pub simple: String,
    pub complex: String,
}

impl TierModels {
    pub fn new(simple: impl Into<String>, complex: impl Into<String>) -> Self {
        Self {
            simple: simple.into(),
            complex: complex.into(),
        }
    }

    pub fn resolve(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Simple => &self.simple,
            ModelTier::Complex => &self.complex,
        }
    }
}

impl Default for TierModels {
    fn default() -> Self {
        Self::new("gpt-4o-mini", "gpt-4o")
    }
}

/// OpenAI chat completions provider
#[derive(Debug)]
pub struct OpenAiGenerationProvider<C: HttpClientTrait> {
    client: C,
    auth_header: String,
    base_url: String,
    models: TierModels,
}

impl<C: HttpClientTrait> OpenAiGenerationProvider<C> {
    pub fn new(client: C, api_key: impl Into<String>, models: TierModels) -> Self {
        Self::with_base_url(client, api_key, DEFAULT_OPENAI_BASE_URL, models)
    }

    pub fn with_base_url(
        client: C,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        models: TierModels,
    ) -> Self {
        let auth_header = format!("Bearer {}", api_key.into());
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Self {
            client,
            auth_header,
            base_url,
            models,
        }
    }

    pub fn models(&self) -> &TierModels {
        &self.models
    }

    fn chat_completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    fn headers(&self) -> Vec<(&str, &str)> {
        vec![
            ("Authorization", self.auth_header.as_str()),
            ("Content-Type", "application/json"),
        ]
    }

    /// System prompt, then the context block, then the question.
    /// The context already carries the conversation tail.
    fn build_request(&self, request: &GenerationRequest, stream: bool) -> serde_json::Value {
        let mut messages = Vec::with_capacity(3);

        if !request.system_prompt.is_empty() {
            messages.push(OpenAiMessage::new("system", &request.system_prompt));
        }

        if !request.context.is_empty() {
            messages.push(OpenAiMessage::new("system", &request.context));
        }

        messages.push(OpenAiMessage::new("user", &request.query));

        let mut body = serde_json::json!({
            "model": self.models.resolve(request.tier),
            "messages": messages,
            "stream": stream,
        });

        if let Some(temp) = request.temperature {
            body["temperature"] = serde_json::json!(temp);
        }

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        body
    }

    fn parse_response(&self, json: serde_json::Value) -> Result<GenerationResponse, DomainError> {
        let response: OpenAiResponse = serde_json::from_value(json).map_err(|e| {
            DomainError::generation(format!("Failed to parse completion: {}", e))
        })?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| DomainError::generation("No choices in completion"))?;

        let text = choice
            .message
            .content
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| DomainError::generation("Empty completion"))?;

        let mut generation = GenerationResponse::new(response.model, text);

        if let Some(reason) = choice.finish_reason {
            generation = generation.with_finish_reason(parse_finish_reason(&reason));
        }

        if let Some(usage) = response.usage {
            generation =
                generation.with_usage(Usage::new(usage.prompt_tokens, usage.completion_tokens));
        }

        Ok(generation)
    }
}

#[async_trait]
impl<C: HttpClientTrait> GenerationProvider for OpenAiGenerationProvider<C> {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, DomainError> {
        let body = self.build_request(&request, false);
        let response = self
            .client
            .post_json(&self.chat_completions_url(), self.headers(), &body)
            .await
            .map_err(|e| DomainError::generation(e.to_string()))?;

        self.parse_response(response)
    }

    async fn generate_stream(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationStream, DomainError> {
        let body = self.build_request(&request, true);
        let byte_stream = self
            .client
            .post_json_stream(&self.chat_completions_url(), self.headers(), &body)
            .await
            .map_err(|e| DomainError::generation(e.to_string()))?;

        let stream = byte_stream
            .scan(SseDecoder::new(), |decoder, result| {
                let items: Vec<Result<StreamChunk, DomainError>> = match result {
                    Ok(bytes) => decoder
                        .push(&bytes)
                        .iter()
                        .filter_map(|data| parse_sse_event(data))
                        .collect(),
                    Err(e) => vec![Err(DomainError::generation(e.to_string()))],
                };
                futures::future::ready(Some(items))
            })
            .flat_map(stream::iter);

        Ok(Box::pin(stream))
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

fn parse_sse_event(data: &str) -> Option<Result<StreamChunk, DomainError>> {
    if data.trim() == "[DONE]" {
        return None;
    }

    let chunk = match serde_json::from_str::<OpenAiStreamChunk>(data) {
        Ok(chunk) => chunk,
        Err(e) => {
            return Some(Err(DomainError::generation(format!(
                "Malformed stream chunk: {}",
                e
            ))))
        }
    };

    let choice = chunk.choices.into_iter().next()?;

    match (choice.delta.content, choice.finish_reason) {
        (Some(content), _) if !content.is_empty() => Some(Ok(StreamChunk::delta(content))),
        (_, Some(reason)) => Some(Ok(StreamChunk::finished(parse_finish_reason(&reason)))),
        _ => None,
    }
}

fn parse_finish_reason(reason: &str) -> FinishReason {
    match reason {
        "length" => FinishReason::Length,
        "content_filter" => FinishReason::ContentFilter,
        _ => FinishReason::Stop,
    }
}

// OpenAI API types

#[derive(Debug, Serialize)]
struct OpenAiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

impl<'a> OpenAiMessage<'a> {
    fn new(role: &'static str, content: &'a str) -> Self {
        Self { role, content }
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    model: String,
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChunk {
    choices: Vec<OpenAiStreamChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChoice {
    delta: OpenAiDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiDelta {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::llm::MockHttpClient;
    use bytes::Bytes;

    const TEST_URL: &str = "https://api.openai.com/v1/chat/completions";

    fn completion(content: &str) -> serde_json::Value {
        serde_json::json!({
            "id": "chatcmpl-123",
            "model": "gpt-4o",
            "choices": [{
                "message": { "role": "assistant", "content": content },
                "finish_reason": "stop"
            }],
            "usage": { "prompt_tokens": 10, "completion_tokens": 8, "total_tokens": 18 }
        })
    }

    fn request(tier: ModelTier) -> GenerationRequest {
        GenerationRequest::new(tier, "What is the ROI on Villa Mar?")
            .with_system_prompt("You are a property assistant.")
            .with_context("## Retrieved context\n\n[1] ...")
            .with_temperature(Some(0.2))
    }

    #[tokio::test]
    async fn test_generate() {
        let client = MockHttpClient::new().with_response(TEST_URL, completion("About 6% yearly."));
        let provider = OpenAiGenerationProvider::new(client, "test-key", TierModels::default());

        let response = provider.generate(request(ModelTier::Complex)).await.unwrap();

        assert_eq!(response.text, "About 6% yearly.");
        assert_eq!(response.finish_reason, Some(FinishReason::Stop));
        assert_eq!(response.usage.unwrap().total_tokens, 18);
    }

    #[tokio::test]
    async fn test_request_uses_tier_model_and_context() {
        let client = MockHttpClient::new().with_response(TEST_URL, completion("ok"));
        let provider = OpenAiGenerationProvider::new(client, "test-key", TierModels::new("small", "large"));

        provider.generate(request(ModelTier::Simple)).await.unwrap();
        let body = provider.client.last_body().unwrap();

        assert_eq!(body["model"], "small");
        assert_eq!(body["stream"], false);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[2]["role"], "user");
        assert_eq!(messages[2]["content"], "What is the ROI on Villa Mar?");
    }

    #[tokio::test]
    async fn test_empty_completion_is_error() {
        let client = MockHttpClient::new().with_response(TEST_URL, completion("  "));
        let provider = OpenAiGenerationProvider::new(client, "test-key", TierModels::default());

        let result = provider.generate(request(ModelTier::Simple)).await;
        assert!(matches!(result, Err(DomainError::Generation { .. })));
    }

    #[tokio::test]
    async fn test_http_error_is_generation_error() {
        let client = MockHttpClient::new().with_error(TEST_URL, "API key invalid");
        let provider = OpenAiGenerationProvider::new(client, "bad-key", TierModels::default());

        let result = provider.generate(request(ModelTier::Simple)).await;
        assert!(matches!(result, Err(DomainError::Generation { .. })));
    }

    #[tokio::test]
    async fn test_generate_stream() {
        let chunks = vec![
            Bytes::from("data: {\"choices\":[{\"delta\":{\"content\":\"The pool \"},\"finish_reason\":null}]}\n\n"),
            Bytes::from("data: {\"choices\":[{\"delta\":{\"content\":\"opens at 8am.\"},\"fin"),
            Bytes::from("ish_reason\":null}]}\n\ndata: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\ndata: [DONE]\n\n"),
        ];
        let client = MockHttpClient::new().with_stream_response(TEST_URL, chunks);
        let provider = OpenAiGenerationProvider::new(client, "test-key", TierModels::default());

        let items: Vec<StreamChunk> = provider
            .generate_stream(request(ModelTier::Simple))
            .await
            .unwrap()
            .map(|item| item.unwrap())
            .collect()
            .await;

        assert_eq!(
            items,
            vec![
                StreamChunk::delta("The pool "),
                StreamChunk::delta("opens at 8am."),
                StreamChunk::finished(FinishReason::Stop),
            ]
        );
    }

    #[tokio::test]
    async fn test_malformed_stream_chunk_is_error() {
        let client = MockHttpClient::new()
            .with_stream_response(TEST_URL, vec![Bytes::from("data: {not json}\n\n")]);
        let provider = OpenAiGenerationProvider::new(client, "test-key", TierModels::default());

        let items: Vec<_> = provider
            .generate_stream(request(ModelTier::Simple))
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(items.len(), 1);
        assert!(items[0].is_err());
    }
}
