use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::TldwError;

/// Wire protocol spoken by a provider's endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Protocol {
    ChatCompletions,
    GeminiGenerateContent,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Grok,
    Openai,
    Gemini,
    Deepseek,
}

pub struct ProviderConfig {
    pub api_url: &'static str,
    pub model: &'static str,
    pub env_var: &'static str,
    pub max_output_tokens: u32,
    pub temperature: f32,
    pub protocol: Protocol,
}

impl Provider {
    pub const ALL: [Provider; 4] = [
        Provider::Grok,
        Provider::Openai,
        Provider::Gemini,
        Provider::Deepseek,
    ];

    pub fn config(&self) -> ProviderConfig {
        match self {
            Provider::Grok => ProviderConfig {
                api_url: "https://api.x.ai/v1/chat/completions",
                model: "grok-4-fast",
                env_var: "XAI_API_KEY",
                max_output_tokens: 4096,
                temperature: 0.3,
                protocol: Protocol::ChatCompletions,
            },
            Provider::Openai => ProviderConfig {
                api_url: "https://api.openai.com/v1/chat/completions",
                model: "gpt-4o-mini",
                env_var: "OPENAI_API_KEY",
                max_output_tokens: 4096,
                temperature: 0.3,
                protocol: Protocol::ChatCompletions,
            },
            Provider::Gemini => ProviderConfig {
                api_url: "https://generativelanguage.googleapis.com/v1beta/models",
                model: "gemini-2.5-flash",
                env_var: "GEMINI_API_KEY",
                max_output_tokens: 8192,
                temperature: 0.3,
                protocol: Protocol::GeminiGenerateContent,
            },
            Provider::Deepseek => ProviderConfig {
                api_url: "https://api.deepseek.com/chat/completions",
                model: "deepseek-chat",
                env_var: "DEEPSEEK_API_KEY",
                max_output_tokens: 4096,
                temperature: 0.3,
                protocol: Protocol::ChatCompletions,
            },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Provider::Grok => "Grok",
            Provider::Openai => "OpenAI",
            Provider::Gemini => "Gemini",
            Provider::Deepseek => "DeepSeek",
        }
    }

    /// Backend name as used in requests (`aiModel`).
    pub fn key(&self) -> &'static str {
        match self {
            Provider::Grok => "grok",
            Provider::Openai => "openai",
            Provider::Gemini => "gemini",
            Provider::Deepseek => "deepseek",
        }
    }

    /// Validate that the API key is set for this provider
    pub fn validate_api_key(&self) -> Result<String, TldwError> {
        let config = self.config();
        std::env::var(config.env_var)
            .ok()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .ok_or_else(|| TldwError::BackendUnavailable {
                provider: self.name().to_string(),
                env_var: config.env_var.to_string(),
            })
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Provider {
    type Err = TldwError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Provider::ALL
            .into_iter()
            .find(|provider| provider.key() == wanted)
            .ok_or_else(|| TldwError::configuration(format!("Unknown AI model \"{}\"", s.trim())))
    }
}
