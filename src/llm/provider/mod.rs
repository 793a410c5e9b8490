//! LLM Provider implementations and factory
//!
//! Submodules implement the hosted providers; Ollama lives in `llm::ollama`.
//! The backend for an agent is picked from its model identifier when the
//! agent is built and never re-examined afterwards.

pub mod anthropic;
pub mod openai;

use std::sync::Arc;

use crate::core::{Config, Result};
use crate::llm::traits::LLMProvider;
use crate::llm::OllamaClient;

use self::anthropic::AnthropicClient;
use self::openai::OpenAIClient;

/// Backend families a model identifier can map to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderType {
    Ollama,
    OpenAI,
    Anthropic,
}

impl ProviderType {
    /// Infer the backend from a model identifier
    pub fn for_model(model: &str) -> Self {
        let model = model.trim().to_ascii_lowercase();
        if model.starts_with("claude-") {
            ProviderType::Anthropic
        } else if ["gpt-", "o1", "o3", "o4"]
            .iter()
            .any(|prefix| model.starts_with(prefix))
        {
            ProviderType::OpenAI
        } else {
            ProviderType::Ollama
        }
    }
}

/// Create the LLM provider serving `model`
pub fn create_provider(model: &str, config: &Config) -> Result<Arc<dyn LLMProvider>> {
    let provider_type = ProviderType::for_model(model);
    log::debug!("Model '{}' served by {:?}", model, provider_type);

    let provider: Arc<dyn LLMProvider> = match provider_type {
        ProviderType::Ollama => Arc::new(OllamaClient::from_config(config)?),
        ProviderType::OpenAI => Arc::new(OpenAIClient::from_config(config)?),
        ProviderType::Anthropic => Arc::new(AnthropicClient::from_config(config)?),
    };
    Ok(provider)
}
