use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{GenerativeBackend, SYSTEM_INSTRUCTION, errors};
use crate::{clean::clean_output, error::Result, provider::Provider};

/// Native Gemini `models/{model}:generateContent` backend.
pub struct GeminiBackend {
    api_key: String,
    base_url: String,
    model: String,
    client: Client,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    system_instruction: Content<'a>,
    contents: [Content<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

impl GeminiBackend {
    pub fn new(api_key: impl Into<String>) -> Self {
        let config = Provider::Gemini.config();
        Self {
            api_key: api_key.into(),
            base_url: config.api_url.to_string(),
            model: config.model.to_string(),
            client: Client::new(),
        }
    }

    /// Override the `.../models` base URL.
    pub fn with_endpoint(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn url(&self) -> String {
        format!(
            "{}/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

#[async_trait]
impl GenerativeBackend for GeminiBackend {
    fn name(&self) -> &str {
        Provider::Gemini.key()
    }

    async fn generate_content(&self, prompt: &str) -> Result<String> {
        let config = Provider::Gemini.config();
        let request = GeminiRequest {
            system_instruction: Content {
                role: None,
                parts: [Part {
                    text: SYSTEM_INSTRUCTION,
                }],
            },
            contents: [Content {
                role: Some("user"),
                parts: [Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                max_output_tokens: config.max_output_tokens,
                temperature: config.temperature,
            },
        };

        debug!(model = %self.model, prompt_chars = prompt.len(), "sending Gemini request");

        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| errors::transport_failed(Provider::Gemini, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(errors::request_failed(Provider::Gemini, status.as_u16(), &body));
        }

        let body: GeminiResponse = response
            .json()
            .await
            .map_err(|e| errors::transport_failed(Provider::Gemini, e))?;

        if body.candidates.is_empty() {
            warn!(feedback = ?body.prompt_feedback, "Gemini returned no candidates");
        }

        let raw: String = body
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| content.parts.into_iter().map(|part| part.text).collect())
            .unwrap_or_default();

        Ok(clean_output(&raw))
    }
}
