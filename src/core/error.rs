//! Custom error types for Roundtable
//!
//! Only configuration problems, failed agent turns and re-entrant submissions
//! leave the crate as errors. Everything else is logged and recovered locally.

use thiserror::Error;

/// Main error type for Roundtable operations
#[derive(Error, Debug)]
pub enum RoundtableError {
    /// Invalid roster, budget bounds, missing API key, unreadable config file
    #[error("Configuration error: {0}")]
    Config(String),

    /// Backend connection or API errors
    #[error("{backend} error: {message}")]
    Provider { backend: String, message: String },

    /// Model not available on the backend
    #[error("Model '{0}' not available. For Ollama run: ollama pull {0}")]
    ModelNotFound(String),

    /// An agent failed to produce its turn; the conversation was aborted
    #[error("Agent '{speaker}' failed to respond: {source}")]
    Generation {
        speaker: String,
        #[source]
        source: Box<RoundtableError>,
    },

    /// A new user utterance arrived while a conversation was still running
    #[error("A conversation is already in progress")]
    ConversationInProgress,

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error for other cases
    #[error("{0}")]
    Other(String),
}

/// Convenience Result type for Roundtable operations
pub type Result<T> = std::result::Result<T, RoundtableError>;

impl RoundtableError {
    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a backend error tagged with the backend name
    pub fn provider(backend: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Provider {
            backend: backend.into(),
            message: msg.into(),
        }
    }

    /// Wrap a backend failure as the failed turn of `speaker`
    pub fn generation(speaker: impl Into<String>, source: RoundtableError) -> Self {
        Self::Generation {
            speaker: speaker.into(),
            source: Box::new(source),
        }
    }

    /// Whether this error aborted a running conversation
    pub fn is_generation_failure(&self) -> bool {
        matches!(self, Self::Generation { .. })
    }
}
