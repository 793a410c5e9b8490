//! A roster member at runtime
//!
//! Couples the agent's descriptor and resolved context with the backend that
//! speaks for it and, in per-agent memory mode, a private exchange buffer.

use std::sync::Arc;

use crate::agent::conversation::AgentMemory;
use crate::core::{AgentDescriptor, Message, Result, RoundtableError};
use crate::llm::{GenerateOptions, LLMProvider, StreamCallback};

/// One agent taking part in a session
pub struct Participant {
    descriptor: AgentDescriptor,
    context: String,
    llm: Arc<dyn LLMProvider>,
    memory: Option<AgentMemory>,
}

impl Participant {
    pub fn new(descriptor: AgentDescriptor, context: impl Into<String>, llm: Arc<dyn LLMProvider>) -> Self {
        Self {
            descriptor,
            context: context.into(),
            llm,
            memory: None,
        }
    }

    /// Give the agent a private memory of its last `limit` messages
    pub fn with_memory(mut self, limit: usize) -> Self {
        self.memory = Some(AgentMemory::new(limit));
        self
    }

    pub fn id(&self) -> &str {
        &self.descriptor.id
    }

    pub fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn memory(&self) -> Option<&AgentMemory> {
        self.memory.as_ref()
    }

    /// Name of the backend serving this agent
    pub fn backend(&self) -> &str {
        self.llm.name()
    }

    /// The per-turn instruction wrapped around the shared history
    pub fn build_prompt(&self, conversation: &str) -> String {
        format!(
            "Conversation:\n{}\n\nYou are {}. Considering everything said above, make your next \
             contribution to the discussion and take the other agents' views into account:",
            conversation, self.descriptor.id
        )
    }

    /// Context, private memory and the new prompt, in send order
    pub fn messages_for(&self, prompt: &str) -> Vec<Message> {
        let mut messages = vec![Message::system(self.context.clone())];
        if let Some(ref memory) = self.memory {
            messages.extend(memory.messages().cloned());
        }
        messages.push(Message::user(prompt));
        messages
    }

    /// Generate this agent's reply to `prompt`
    ///
    /// Memory is only updated when a non-empty reply comes back.
    pub async fn respond(&mut self, prompt: &str, on_token: Option<StreamCallback>) -> Result<String> {
        let messages = self.messages_for(prompt);
        let options = Some(GenerateOptions::deterministic());
        let model = self.descriptor.model.as_str();

        log::debug!(
            "Calling {} for agent '{}' ({} messages)",
            self.llm.name(),
            self.descriptor.id,
            messages.len()
        );

        let response = match on_token {
            Some(callback) => self.llm.chat_stream(model, &messages, options, callback).await?,
            None => self.llm.chat(model, &messages, options).await?,
        };

        let reply = response.content.trim().to_string();
        if reply.is_empty() {
            return Err(RoundtableError::provider(
                self.llm.name(),
                format!("model '{}' returned an empty reply", model),
            ));
        }

        if let Some(ref mut memory) = self.memory {
            memory.record_exchange(prompt, reply.clone());
        }
        Ok(reply)
    }
}
