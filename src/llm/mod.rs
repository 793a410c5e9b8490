//! LLM module - Language Model integrations
//!
//! Provides one abstraction over the text-generation backends, with Ollama as
//! the offline default.

pub mod ollama;
pub mod provider;
pub mod traits;

pub use ollama::OllamaClient;
pub use provider::{create_provider, ProviderType};
pub use traits::{GenerateOptions, LLMProvider, LLMResponse, StreamCallback, TokenUsage};
