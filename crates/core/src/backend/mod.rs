//! Generative text backends and the registry that resolves them by name.

pub mod chat;
pub mod errors;
pub mod gemini;

use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use tracing::info;

pub use chat::ChatCompletionsBackend;
pub use gemini::GeminiBackend;

use crate::{
    error::{Result, TldwError},
    provider::{Protocol, Provider},
};

pub const SYSTEM_INSTRUCTION: &str = "You summarize video transcripts. \
Use only information present in the supplied text, never invent facts, \
and answer directly without greetings, preambles or closing remarks.";

/// Uniform contract over every text-generation provider. Output is already cleaned.
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn generate_content(&self, prompt: &str) -> Result<String>;
}

pub fn build(provider: Provider, api_key: String) -> Arc<dyn GenerativeBackend> {
    match provider.config().protocol {
        Protocol::ChatCompletions => Arc::new(ChatCompletionsBackend::new(provider, api_key)),
        Protocol::GeminiGenerateContent => Arc::new(GeminiBackend::new(api_key)),
    }
}

#[derive(Clone)]
pub enum BackendSlot {
    Ready(Arc<dyn GenerativeBackend>),
    Unavailable { provider: String, env_var: String },
}

/// Known backends by lowercase name, configured or not.
#[derive(Clone, Default)]
pub struct BackendRegistry {
    slots: BTreeMap<String, BackendSlot>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// One slot per provider, ready when its credential is present.
    pub fn from_env() -> Self {
        let mut registry = Self::new();
        for provider in Provider::ALL {
            let slot = match provider.validate_api_key() {
                Ok(api_key) => BackendSlot::Ready(build(provider, api_key)),
                Err(_) => BackendSlot::Unavailable {
                    provider: provider.name().to_string(),
                    env_var: provider.config().env_var.to_string(),
                },
            };
            registry.slots.insert(provider.key().to_string(), slot);
        }

        info!(available = ?registry.available(), "generative backends configured");
        registry
    }

    pub fn insert(&mut self, name: &str, backend: Arc<dyn GenerativeBackend>) {
        self.slots
            .insert(name.trim().to_ascii_lowercase(), BackendSlot::Ready(backend));
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<dyn GenerativeBackend>> {
        match self.slots.get(&name.trim().to_ascii_lowercase()) {
            Some(BackendSlot::Ready(backend)) => Ok(Arc::clone(backend)),
            Some(BackendSlot::Unavailable { provider, env_var }) => {
                Err(TldwError::BackendUnavailable {
                    provider: provider.clone(),
                    env_var: env_var.clone(),
                })
            }
            None => Err(TldwError::configuration(format!(
                "Unknown AI model \"{}\". Available: {}",
                name.trim(),
                self.slots.keys().cloned().collect::<Vec<_>>().join(", ")
            ))),
        }
    }

    /// Names of the backends that can be used right now.
    pub fn available(&self) -> Vec<String> {
        self.slots
            .iter()
            .filter(|(_, slot)| matches!(slot, BackendSlot::Ready(_)))
            .map(|(name, _)| name.clone())
            .collect()
    }
}
