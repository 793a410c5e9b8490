//! Shared types used across Roundtable modules
//!
//! Contains chat message structures, speaker identities and agent descriptors.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier used for the human participant in history and logs
pub const USER_SPEAKER: &str = "user";

/// A message sent to a text-generation backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender (user, assistant, system)
    pub role: String,
    /// Content of the message
    pub content: String,
}

impl Message {
    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    /// Create a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }

    /// Create a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }
}

/// Case-folded form of an agent identifier, used for every identifier comparison
pub fn fold_id(id: &str) -> String {
    id.trim().to_lowercase()
}

/// Who produced an utterance
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Speaker {
    /// The human on the other side of the chat
    User,
    /// A roster member, by identifier
    Agent(String),
}

impl Speaker {
    /// Create an agent speaker
    pub fn agent(id: impl Into<String>) -> Self {
        Self::Agent(id.into())
    }

    /// Identifier as written to history and logs
    pub fn as_str(&self) -> &str {
        match self {
            Speaker::User => USER_SPEAKER,
            Speaker::Agent(id) => id,
        }
    }

    /// Whether this is the agent with the given identifier (case-insensitive)
    pub fn is_agent(&self, id: &str) -> bool {
        match self {
            Speaker::User => false,
            Speaker::Agent(own) => fold_id(own) == fold_id(id),
        }
    }
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded unit of conversation history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    pub speaker: Speaker,
    pub text: String,
}

impl Utterance {
    /// Create an utterance from the user
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::User,
            text: text.into(),
        }
    }

    /// Create an utterance from an agent
    pub fn agent(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::agent(id),
            text: text.into(),
        }
    }
}

impl fmt::Display for Utterance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.speaker, self.text)
    }
}

/// Static description of one agent in the roster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentDescriptor {
    /// Unique key, also used to find the role context document
    pub id: String,
    /// What this agent is supposed to do in the conversation
    pub role: String,
    /// Backing model identifier (e.g. `llama3`, `gpt-4o-mini`, `claude-3-5-sonnet-20240620`)
    pub model: String,
}

impl AgentDescriptor {
    pub fn new(id: impl Into<String>, role: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: role.into(),
            model: model.into(),
        }
    }
}

/// Truncate text to `max_chars` characters, marking the cut with `...`
///
/// Shorter text is returned unchanged. Counts characters, not bytes.
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
