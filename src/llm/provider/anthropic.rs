//! Anthropic messages API client
//!
//! The messages API takes the system prompt as a separate field, so system
//! messages are lifted out of the message list before sending.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::core::{Config, Message, Result, RoundtableError};
use crate::llm::traits::{GenerateOptions, LLMProvider, LLMResponse, TokenUsage};

const BACKEND: &str = "anthropic";

/// Anthropic API client
#[derive(Clone)]
pub struct AnthropicClient {
    client: Client,
    base_url: String,
    api_key: String,
    api_version: String,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<&'a Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_sequences: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    model: String,
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

impl AnthropicClient {
    /// Create a client from configuration; fails without an API key
    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = config.anthropic.api_key.clone().ok_or_else(|| {
            RoundtableError::config(
                "ANTHROPIC_API_KEY is not set but a Claude model is configured",
            )
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.anthropic.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.anthropic.base_url.trim_end_matches('/').to_string(),
            api_key,
            api_version: config.anthropic.api_version.clone(),
            max_tokens: config.anthropic.max_tokens,
        })
    }

    /// Split system messages from the conversation turns
    fn build_request<'a>(
        &self,
        model: &'a str,
        messages: &'a [Message],
        options: GenerateOptions,
    ) -> MessagesRequest<'a> {
        let system: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == "system")
            .map(|m| m.content.as_str())
            .collect();

        MessagesRequest {
            model,
            max_tokens: options.max_tokens.unwrap_or(self.max_tokens),
            system: (!system.is_empty()).then(|| system.join("\n\n")),
            messages: messages.iter().filter(|m| m.role != "system").collect(),
            temperature: options.temperature,
            stop_sequences: options.stop,
        }
    }

    fn parse_response(body: &str) -> Result<LLMResponse> {
        let parsed: MessagesResponse = serde_json::from_str(body).map_err(|e| {
            RoundtableError::provider(BACKEND, format!("Failed to parse response: {}", e))
        })?;

        let content: String = parsed
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");

        Ok(LLMResponse {
            content,
            usage: parsed
                .usage
                .map(|u| TokenUsage::new(u.input_tokens, u.output_tokens)),
            model: parsed.model,
        })
    }
}

#[async_trait]
impl LLMProvider for AnthropicClient {
    async fn chat(
        &self,
        model: &str,
        messages: &[Message],
        options: Option<GenerateOptions>,
    ) -> Result<LLMResponse> {
        let request = self.build_request(model, messages, options.unwrap_or_default());

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", &self.api_version)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status.as_u16() == 404 {
            return Err(RoundtableError::ModelNotFound(model.to_string()));
        }
        if !status.is_success() {
            return Err(RoundtableError::provider(
                BACKEND,
                format!("Anthropic API error ({}): {}", status, body),
            ));
        }

        Self::parse_response(&body)
    }

    fn name(&self) -> &str {
        BACKEND
    }
}
