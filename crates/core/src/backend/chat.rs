use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{GenerativeBackend, SYSTEM_INSTRUCTION, errors};
use crate::{clean::clean_output, error::Result, provider::Provider};

/// OpenAI-compatible `/chat/completions` backend (OpenAI, Grok, DeepSeek).
pub struct ChatCompletionsBackend {
    provider: Provider,
    api_key: String,
    endpoint: String,
    model: String,
    client: Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatCompletionsBackend {
    pub fn new(provider: Provider, api_key: impl Into<String>) -> Self {
        let config = provider.config();
        Self {
            provider,
            api_key: api_key.into(),
            endpoint: config.api_url.to_string(),
            model: config.model.to_string(),
            client: Client::new(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl GenerativeBackend for ChatCompletionsBackend {
    fn name(&self) -> &str {
        self.provider.key()
    }

    async fn generate_content(&self, prompt: &str) -> Result<String> {
        let config = self.provider.config();
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_INSTRUCTION,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            max_tokens: config.max_output_tokens,
            temperature: config.temperature,
        };

        debug!(
            provider = self.provider.key(),
            model = %self.model,
            prompt_chars = prompt.len(),
            "sending chat completion request"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| errors::transport_failed(self.provider, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(errors::request_failed(self.provider, status.as_u16(), &body));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| errors::transport_failed(self.provider, e))?;
        let raw = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        Ok(clean_output(&raw))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_partial_json, header, method, path},
    };

    use super::*;
    use crate::error::{BackendErrorKind, TldwError};

    fn backend_for(server: &MockServer, provider: Provider) -> ChatCompletionsBackend {
        ChatCompletionsBackend::new(provider, "test-key")
            .with_endpoint(format!("{}/v1/chat/completions", server.uri()))
    }

    #[tokio::test]
    async fn sends_system_instruction_and_cleans_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(json!({
                "model": "deepseek-chat",
                "messages": [{"role": "system"}, {"role": "user", "content": "summarize this"}],
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "Here is the summary:\nCaches are fast."}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let backend = backend_for(&server, Provider::Deepseek);
        let out = backend.generate_content("summarize this").await.unwrap();

        assert_eq!(out, "Caches are fast.");
    }

    #[tokio::test]
    async fn maps_status_through_the_provider_table() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "error": {"message": "You exceeded your current quota", "type": "insufficient_quota", "code": "insufficient_quota"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let backend = backend_for(&server, Provider::Openai);
        let err = backend.generate_content("x").await.unwrap_err();

        match err {
            TldwError::BackendRequestFailed { provider, kind, status, .. } => {
                assert_eq!(provider, "OpenAI");
                assert_eq!(kind, BackendErrorKind::Quota);
                assert_eq!(status, Some(429));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_content_yields_empty_output() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        let backend = backend_for(&server, Provider::Grok);
        assert_eq!(backend.generate_content("x").await.unwrap(), "");
    }

    #[tokio::test]
    async fn failures_are_single_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let backend = backend_for(&server, Provider::Deepseek);
        let err = backend.generate_content("x").await.unwrap_err();

        assert!(matches!(
            err,
            TldwError::BackendRequestFailed { kind: BackendErrorKind::ServerError, .. }
        ));
    }
}
