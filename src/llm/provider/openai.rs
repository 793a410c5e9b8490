//! OpenAI-compatible chat completions client
//!
//! Works against api.openai.com and any server exposing the same
//! `/chat/completions` route.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::core::{Config, Message, Result, RoundtableError};
use crate::llm::traits::{GenerateOptions, LLMProvider, LLMResponse, TokenUsage};

const BACKEND: &str = "openai";

/// OpenAI API client
#[derive(Clone)]
pub struct OpenAIClient {
    client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    model: String,
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

impl OpenAIClient {
    /// Create a client from configuration; fails without an API key
    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = config.openai.api_key.clone().ok_or_else(|| {
            RoundtableError::config("OPENAI_API_KEY is not set but an OpenAI model is configured")
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.openai.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.openai.base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn parse_response(body: &str) -> Result<LLMResponse> {
        let parsed: ChatResponse = serde_json::from_str(body).map_err(|e| {
            RoundtableError::provider(BACKEND, format!("Failed to parse response: {}", e))
        })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| RoundtableError::provider(BACKEND, "Response contained no message"))?;

        Ok(LLMResponse {
            content,
            usage: parsed
                .usage
                .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens)),
            model: parsed.model,
        })
    }
}

#[async_trait]
impl LLMProvider for OpenAIClient {
    async fn chat(
        &self,
        model: &str,
        messages: &[Message],
        options: Option<GenerateOptions>,
    ) -> Result<LLMResponse> {
        let options = options.unwrap_or_default();
        let request = ChatRequest {
            model,
            messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            stop: options.stop,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status.as_u16() == 404 && body.contains("model") {
            return Err(RoundtableError::ModelNotFound(model.to_string()));
        }
        if !status.is_success() {
            return Err(RoundtableError::provider(
                BACKEND,
                format!("OpenAI API error ({}): {}", status, body),
            ));
        }

        Self::parse_response(&body)
    }

    fn name(&self) -> &str {
        BACKEND
    }
}
