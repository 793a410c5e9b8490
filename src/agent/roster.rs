//! Agent registry and role context loading
//!
//! The roster comes from the `[agents]` section of the config. Each agent's
//! standing instructions are a short role preamble, optionally extended by a
//! markdown document named after the agent.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use crate::core::config::MODERATOR_ID;
use crate::core::{fold_id, AgentDescriptor, Config, Result, RoundtableError, USER_SPEAKER};

/// The moderator plus the agents eligible to speak
#[derive(Debug, Clone)]
pub struct Roster {
    moderator: AgentDescriptor,
    members: Vec<AgentDescriptor>,
}

impl Roster {
    /// Build a roster, rejecting anything the scheduler cannot run
    ///
    /// Needs at least two members so that a speaker other than the previous
    /// one always exists.
    pub fn new(moderator: AgentDescriptor, members: Vec<AgentDescriptor>) -> Result<Self> {
        if members.len() < 2 {
            return Err(RoundtableError::config(format!(
                "the roster needs at least two agents besides the moderator, found {}",
                members.len()
            )));
        }

        let mut seen: Vec<String> = Vec::with_capacity(members.len());
        for member in &members {
            let key = fold_id(&member.id);
            if key.is_empty() {
                return Err(RoundtableError::config("agent identifiers must not be empty"));
            }
            if key == MODERATOR_ID {
                return Err(RoundtableError::config(
                    "the moderator cannot also be a roster member",
                ));
            }
            if key == USER_SPEAKER {
                return Err(RoundtableError::config(format!(
                    "'{}' is reserved for the human participant",
                    member.id
                )));
            }
            if key.contains(':') {
                return Err(RoundtableError::config(format!(
                    "agent identifier '{}' must not contain ':'",
                    member.id
                )));
            }
            if seen.contains(&key) {
                return Err(RoundtableError::config(format!(
                    "duplicate agent identifier '{}'",
                    member.id
                )));
            }
            seen.push(key);
        }

        Ok(Self { moderator, members })
    }

    pub fn moderator(&self) -> &AgentDescriptor {
        &self.moderator
    }

    /// Agents eligible to speak, in roster order
    pub fn members(&self) -> &[AgentDescriptor] {
        &self.members
    }

    /// Identifiers of the agents eligible to speak
    pub fn member_ids(&self) -> Vec<&str> {
        self.members.iter().map(|m| m.id.as_str()).collect()
    }

    /// Find a member by identifier, ignoring case
    pub fn find(&self, id: &str) -> Option<&AgentDescriptor> {
        let wanted = fold_id(id);
        self.members.iter().find(|m| fold_id(&m.id) == wanted)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Load the roster from the `[agents]` section of the configuration
pub fn load_roster(config: &Config) -> Result<Roster> {
    let moderator = config
        .agents
        .get(MODERATOR_ID)
        .map(|entry| AgentDescriptor::new(MODERATOR_ID, &entry.role, &entry.model))
        .ok_or_else(|| {
            RoundtableError::config(format!("the roster has no '{}' entry", MODERATOR_ID))
        })?;

    let members = config
        .agents
        .iter()
        .filter(|(id, _)| id.as_str() != MODERATOR_ID)
        .map(|(id, entry)| AgentDescriptor::new(id, &entry.role, &entry.model))
        .collect();

    Roster::new(moderator, members)
}

/// Keyed source of supplementary role documents
pub trait DocumentStore: Send + Sync {
    /// Fetch the document for `key`; `Ok(None)` when there is none
    fn fetch(&self, key: &str) -> Result<Option<String>>;
}

/// Reads `<dir>/<key>.md`
#[derive(Debug, Clone)]
pub struct DirectoryDocumentStore {
    dir: PathBuf,
}

impl DirectoryDocumentStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.md", key))
    }
}

impl DocumentStore for DirectoryDocumentStore {
    fn fetch(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Documents held in memory, keyed by agent identifier
#[derive(Debug, Clone, Default)]
pub struct MemoryDocumentStore {
    docs: HashMap<String, String>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, text: impl Into<String>) {
        self.docs.insert(key.into(), text.into());
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn fetch(&self, key: &str) -> Result<Option<String>> {
        Ok(self.docs.get(key).cloned())
    }
}

/// Build the standing context text for an agent
///
/// Always succeeds: a missing or unreadable document leaves the preamble alone.
pub fn resolve_context(id: &str, description: &str, documents: &dyn DocumentStore) -> String {
    let preamble = format!("Your role is {}: {}", id, description);

    match documents.fetch(id) {
        Ok(Some(doc)) if !doc.trim().is_empty() => format!("{}\n\n{}", preamble, doc),
        Ok(_) => {
            log::debug!("No role context document for '{}'", id);
            preamble
        }
        Err(e) => {
            log::warn!(
                "Could not read role context for '{}', using preamble only: {}",
                id,
                e
            );
            preamble
        }
    }
}
