//! Conversation history management
//!
//! A ring buffer of utterances shared by every turn of a session, plus the
//! smaller message buffer an agent keeps for itself in per-agent memory mode.

use std::collections::VecDeque;

use crate::core::{Message, Speaker, Utterance};

/// Ordered, size-bounded log of who said what
///
/// Never holds more than `capacity` entries; the oldest entry is evicted first.
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    entries: VecDeque<Utterance>,
    capacity: usize,
}

impl ConversationHistory {
    /// Create an empty history holding at most `capacity` utterances (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an utterance, evicting from the front when full
    pub fn push(&mut self, utterance: Utterance) {
        self.entries.push_back(utterance);

        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    /// Get the last N utterances, oldest first
    pub fn last_n(&self, n: usize) -> impl Iterator<Item = &Utterance> {
        self.entries.iter().skip(self.entries.len().saturating_sub(n))
    }

    /// Render the last N utterances as `speaker: text` lines
    pub fn render(&self, n: usize) -> String {
        self.last_n(n)
            .map(|u| u.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Speaker of the most recent utterance
    pub fn last_speaker(&self) -> Option<&Speaker> {
        self.entries.back().map(|u| &u.speaker)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Utterance> {
        self.entries.iter()
    }

    /// Clear all history
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get utterance count
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// An agent's private record of its own exchanges
#[derive(Debug, Clone)]
pub struct AgentMemory {
    messages: VecDeque<Message>,
    max_length: usize,
}

impl AgentMemory {
    pub fn new(max_length: usize) -> Self {
        Self {
            messages: VecDeque::new(),
            max_length,
        }
    }

    /// Record one completed prompt/reply pair
    pub fn record_exchange(&mut self, prompt: impl Into<String>, reply: impl Into<String>) {
        self.add_message(Message::user(prompt));
        self.add_message(Message::assistant(reply));
    }

    /// Add a message and maintain size limit
    fn add_message(&mut self, message: Message) {
        self.messages.push_back(message);

        while self.messages.len() > self.max_length {
            self.messages.pop_front();
        }
    }

    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
