//! Ollama client implementation
//!
//! Async HTTP client for the Ollama chat API with streaming support.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::core::{truncate_text, Config, Message, Result, RoundtableError};
use crate::llm::traits::{GenerateOptions, LLMProvider, LLMResponse, StreamCallback, TokenUsage};

const BACKEND: &str = "ollama";

/// Ollama API client
#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
}

/// Ollama chat request
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
    stream: bool,
}

/// Ollama message format
#[derive(Debug, Deserialize)]
struct OllamaMessage {
    #[serde(default)]
    content: String,
}

/// Ollama generation options
#[derive(Debug, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
}

impl From<GenerateOptions> for OllamaOptions {
    fn from(opts: GenerateOptions) -> Self {
        Self {
            temperature: opts.temperature,
            num_predict: opts.max_tokens,
            stop: opts.stop,
        }
    }
}

/// Ollama chat response (non-streaming)
#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: OllamaMessage,
    model: String,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

/// Ollama streaming chunk response
#[derive(Debug, Deserialize)]
struct StreamChunkResponse {
    #[serde(default)]
    message: Option<OllamaMessage>,
    model: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

/// Ollama models list response
#[derive(Debug, Deserialize)]
struct ModelsResponse {
    models: Vec<ModelInfo>,
}

/// Model information
#[derive(Debug, Deserialize)]
struct ModelInfo {
    name: String,
}

/// Byte buffer that hands out complete NDJSON lines
///
/// Chunks may end inside a multi-byte character, so text is only decoded once
/// the whole line has arrived.
#[derive(Debug, Default)]
struct LineBuffer {
    bytes: Vec<u8>,
}

impl LineBuffer {
    fn extend(&mut self, chunk: &[u8]) {
        self.bytes.extend_from_slice(chunk);
    }

    fn next_line(&mut self) -> Option<String> {
        let pos = self.bytes.iter().position(|&b| b == b'\n')?;
        let line: Vec<u8> = self.bytes.drain(..=pos).collect();
        Some(String::from_utf8_lossy(&line).trim().to_string())
    }

    /// Whatever is left after the stream closed
    fn finish(self) -> String {
        String::from_utf8_lossy(&self.bytes).trim().to_string()
    }
}

fn usage_from_counts(prompt: Option<u32>, completion: Option<u32>) -> Option<TokenUsage> {
    match (prompt, completion) {
        (Some(prompt), Some(completion)) => Some(TokenUsage::new(prompt, completion)),
        _ => None,
    }
}

impl OllamaClient {
    /// Create a new Ollama client from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.ollama.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.ollama_url(),
        })
    }

    /// Create a client with custom base URL
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn connect_error(&self, e: reqwest::Error) -> RoundtableError {
        if e.is_connect() {
            RoundtableError::provider(
                BACKEND,
                format!("Cannot connect to Ollama at {}. Is it running?", self.base_url),
            )
        } else if e.is_timeout() {
            RoundtableError::provider(BACKEND, format!("Request timed out: {}", e))
        } else {
            RoundtableError::from(e)
        }
    }

    /// Send a chat request and turn non-success statuses into errors
    async fn post_chat(&self, request: &ChatRequest<'_>) -> Result<reqwest::Response> {
        if log::log_enabled!(log::Level::Debug) {
            let request_json = serde_json::to_string(request)?;
            log::debug!("Ollama request: {}", truncate_text(&request_json, 500));
        }

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(request)
            .send()
            .await
            .map_err(|e| self.connect_error(e))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();

            if status.as_u16() == 404 && error_text.contains("not found") {
                return Err(RoundtableError::ModelNotFound(request.model.to_string()));
            }

            return Err(RoundtableError::provider(
                BACKEND,
                format!("Ollama API error ({}): {}", status, error_text),
            ));
        }

        Ok(response)
    }

    /// Decode one NDJSON line of a streaming response into `acc`
    fn apply_stream_line(
        line: &str,
        acc: &mut StreamAccumulator,
        on_token: &StreamCallback,
    ) {
        match serde_json::from_str::<StreamChunkResponse>(line) {
            Ok(chunk) => {
                acc.model = chunk.model;
                if let Some(msg) = chunk.message {
                    if !msg.content.is_empty() {
                        on_token(&msg.content);
                        acc.content.push_str(&msg.content);
                    }
                }
                if chunk.done {
                    acc.usage = usage_from_counts(chunk.prompt_eval_count, chunk.eval_count);
                }
            }
            Err(e) => log::debug!("Skipping unparsable stream line ({}): {}", e, line),
        }
    }
}

/// Running state of a streamed reply
struct StreamAccumulator {
    content: String,
    model: String,
    usage: Option<TokenUsage>,
}

#[async_trait]
impl LLMProvider for OllamaClient {
    async fn chat(
        &self,
        model: &str,
        messages: &[Message],
        options: Option<GenerateOptions>,
    ) -> Result<LLMResponse> {
        let request = ChatRequest {
            model,
            messages,
            options: options.map(OllamaOptions::from),
            stream: false,
        };

        let response = self.post_chat(&request).await?;
        let response_text = response.text().await?;
        log::debug!("Ollama response: {}", truncate_text(&response_text, 500));

        let chat_response: ChatResponse = serde_json::from_str(&response_text).map_err(|e| {
            RoundtableError::provider(BACKEND, format!("Failed to parse response: {}", e))
        })?;

        Ok(LLMResponse {
            content: chat_response.message.content,
            usage: usage_from_counts(chat_response.prompt_eval_count, chat_response.eval_count),
            model: chat_response.model,
        })
    }

    async fn chat_stream(
        &self,
        model: &str,
        messages: &[Message],
        options: Option<GenerateOptions>,
        on_token: StreamCallback,
    ) -> Result<LLMResponse> {
        let request = ChatRequest {
            model,
            messages,
            options: options.map(OllamaOptions::from),
            stream: true,
        };

        let response = self.post_chat(&request).await?;

        let mut acc = StreamAccumulator {
            content: String::new(),
            model: model.to_string(),
            usage: None,
        };
        let mut stream = response.bytes_stream();
        let mut buffer = LineBuffer::default();

        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result
                .map_err(|e| RoundtableError::provider(BACKEND, format!("Stream error: {}", e)))?;
            buffer.extend(&chunk);

            // Process complete JSON lines from buffer
            while let Some(line) = buffer.next_line() {
                if !line.is_empty() {
                    Self::apply_stream_line(&line, &mut acc, &on_token);
                }
            }
        }

        let rest = buffer.finish();
        if !rest.is_empty() {
            Self::apply_stream_line(&rest, &mut acc, &on_token);
        }

        Ok(LLMResponse {
            content: acc.content,
            usage: acc.usage,
            model: acc.model,
        })
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
            .map_err(|e| self.connect_error(e))?;

        if !response.status().is_success() {
            return Err(RoundtableError::provider(BACKEND, "Failed to list models"));
        }

        let models_response: ModelsResponse = response.json().await?;
        Ok(models_response.models.into_iter().map(|m| m.name).collect())
    }

    fn name(&self) -> &str {
        BACKEND
    }
}
