//! Configuration management for Roundtable
//!
//! Supports environment variables, config files, and runtime overrides.
//! The agent roster lives here too: every `[agents.<id>]` table is one agent,
//! and the one keyed `moderator` picks who speaks next.
//!
//! Config file location: ~/.config/roundtable/config.toml

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::error::{Result, RoundtableError};

/// Roster key of the moderator agent
pub const MODERATOR_ID: &str = "moderator";

/// Main configuration for Roundtable
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Ollama configuration
    pub ollama: OllamaConfig,
    /// OpenAI-compatible endpoint configuration
    pub openai: OpenAIConfig,
    /// Anthropic configuration
    pub anthropic: AnthropicConfig,
    /// Turn-taking behaviour
    pub conversation: ConversationConfig,
    /// Agent roster, including the moderator
    pub agents: BTreeMap<String, AgentEntry>,
    /// Whether to show debug output
    pub debug: bool,
}

/// Ollama server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    /// Host address (default: localhost)
    pub host: String,
    /// Port number (default: 11434)
    pub port: u16,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

/// OpenAI-compatible chat completions endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAIConfig {
    /// Base URL up to and including the version segment
    pub base_url: String,
    /// API key; read from OPENAI_API_KEY when absent, never written back
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

/// Anthropic messages endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnthropicConfig {
    /// Base URL without the `/v1/messages` suffix
    pub base_url: String,
    /// API key; read from ANTHROPIC_API_KEY when absent, never written back
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Value of the `anthropic-version` header
    pub api_version: String,
    /// Upper bound on generated tokens per reply
    pub max_tokens: u32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

/// How the number of turns per user message is decided
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetMode {
    /// Always run `turns` agent turns
    Fixed,
    /// The moderator's first pick also says how many turns to run
    Moderated,
}

/// What an agent remembers between its own turns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryMode {
    /// Only the shared, bounded conversation history
    Shared,
    /// Shared history plus a private buffer of the agent's own exchanges
    PerAgent,
}

/// Turn budget ("baton") settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    pub mode: BudgetMode,
    /// Fixed budget, and the fallback when the moderator names no count
    pub turns: usize,
    /// Lower clamp for moderator-assigned budgets
    pub min_turns: usize,
    /// Upper clamp for moderator-assigned budgets
    pub max_turns: usize,
}

/// Conversation behaviour configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    /// Maximum number of utterances kept in history
    /// Default: 50
    pub history_limit: usize,
    /// Number of recent utterances shown to the moderator and agents
    /// Default: 10
    pub moderator_window: usize,
    pub budget: BudgetConfig,
    pub memory: MemoryMode,
    /// Messages kept in each agent's private memory (per-agent mode only)
    /// Default: 20
    pub agent_memory_limit: usize,
    /// Stream agent tokens to the observer as they arrive
    pub streaming: bool,
    /// Directory holding `<agent id>.md` role context documents
    pub role_context_dir: PathBuf,
    /// JSON-lines interaction log; `None` disables it
    pub log_file: Option<PathBuf>,
    /// Characters kept of each prompt/response in the interaction log
    /// Default: 100
    pub log_truncate: usize,
}

/// One roster entry as written in the config file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentEntry {
    /// Role description handed to the agent
    pub role: String,
    /// Backing model identifier
    pub model: String,
}

impl AgentEntry {
    pub fn new(role: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            model: model.into(),
        }
    }
}

fn env_flag(name: &str) -> Option<bool> {
    env::var(name).ok().map(|v| v == "true" || v == "1")
}

fn env_nonempty(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ollama: OllamaConfig::default(),
            openai: OpenAIConfig::default(),
            anthropic: AnthropicConfig::default(),
            conversation: ConversationConfig::default(),
            agents: default_roster(),
            debug: env_flag("ROUNDTABLE_DEBUG").unwrap_or(false),
        }
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: env::var("OLLAMA_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: env::var("OLLAMA_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(11434),
            timeout_secs: 120,
        }
    }
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            base_url: env_nonempty("OPENAI_BASE_URL")
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            api_key: env_nonempty("OPENAI_API_KEY"),
            timeout_secs: 120,
        }
    }
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.anthropic.com".to_string(),
            api_key: env_nonempty("ANTHROPIC_API_KEY"),
            api_version: "2023-06-01".to_string(),
            max_tokens: 1000,
            timeout_secs: 120,
        }
    }
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            mode: BudgetMode::Fixed,
            turns: 1,
            min_turns: 1,
            max_turns: 5,
        }
    }
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            history_limit: 50,
            moderator_window: 10,
            budget: BudgetConfig::default(),
            memory: MemoryMode::PerAgent,
            agent_memory_limit: 20,
            streaming: true,
            role_context_dir: PathBuf::from("role_contexts"),
            log_file: Some(
                env_nonempty("ROUNDTABLE_LOG_FILE")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("agent_interactions.jsonl")),
            ),
            log_truncate: 100,
        }
    }
}

/// Roster used when no config file defines one
pub fn default_roster() -> BTreeMap<String, AgentEntry> {
    let mut agents = BTreeMap::new();
    agents.insert(
        MODERATOR_ID.to_string(),
        AgentEntry::new(
            "Keeps the discussion moving and decides who should speak next.",
            "llama3",
        ),
    );
    agents.insert(
        "analyst".to_string(),
        AgentEntry::new(
            "Breaks the user's question down and brings facts and numbers.",
            "llama3",
        ),
    );
    agents.insert(
        "critic".to_string(),
        AgentEntry::new(
            "Challenges weak arguments and points out risks the others missed.",
            "llama3",
        ),
    );
    agents.insert(
        "strategist".to_string(),
        AgentEntry::new(
            "Turns the discussion into a concrete plan with next steps.",
            "llama3",
        ),
    );
    agents
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("roundtable")
    }

    /// Get the config file path
    pub fn config_file() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load configuration from file, environment, and defaults
    /// Priority: CLI args > config file > env vars > defaults
    ///
    /// A missing config file means defaults; a file that exists but cannot be
    /// read or parsed is an error.
    pub fn load() -> Result<Self> {
        // Try to load .env file if it exists
        let _ = dotenvy::dotenv();

        Self::load_or_default(&Self::config_file())
    }

    /// Load `path` if it exists, otherwise fall back to defaults (which respect env vars)
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load_from_path(path)
    }

    /// Load configuration from a specific TOML file
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(RoundtableError::config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        let content = fs::read_to_string(path)
            .map_err(|e| RoundtableError::config(format!("Failed to read config: {}", e)))?;

        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    ///
    /// Sections missing from the text take their defaults; API keys missing
    /// from the text are taken from the environment.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| RoundtableError::config(format!("Failed to parse config: {}", e)))
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_dir = Self::config_dir();
        let config_path = Self::config_file();

        // Create config directory if it doesn't exist
        if !config_dir.exists() {
            fs::create_dir_all(&config_dir).map_err(|e| {
                RoundtableError::config(format!("Failed to create config dir: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| RoundtableError::config(format!("Failed to serialize config: {}", e)))?;

        fs::write(&config_path, content)
            .map_err(|e| RoundtableError::config(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Check the conversation settings for values the scheduler cannot run with
    ///
    /// Roster problems are reported by [`crate::agent::roster::load_roster`].
    pub fn validate(&self) -> Result<()> {
        let conv = &self.conversation;
        let budget = &conv.budget;

        if conv.history_limit == 0 {
            return Err(RoundtableError::config(
                "conversation.history_limit must be at least 1",
            ));
        }
        if conv.moderator_window == 0 {
            return Err(RoundtableError::config(
                "conversation.moderator_window must be at least 1",
            ));
        }
        if budget.min_turns == 0 || budget.min_turns > budget.max_turns {
            return Err(RoundtableError::config(format!(
                "conversation.budget bounds [{}, {}] are invalid",
                budget.min_turns, budget.max_turns
            )));
        }
        if budget.turns == 0 {
            return Err(RoundtableError::config(
                "conversation.budget.turns must be at least 1",
            ));
        }
        if budget.mode == BudgetMode::Moderated
            && !(budget.min_turns..=budget.max_turns).contains(&budget.turns)
        {
            return Err(RoundtableError::config(format!(
                "conversation.budget.turns ({}) must lie within [{}, {}] in moderated mode",
                budget.turns, budget.min_turns, budget.max_turns
            )));
        }
        Ok(())
    }

    /// Get the full Ollama API URL
    pub fn ollama_url(&self) -> String {
        format!("http://{}:{}", self.ollama.host, self.ollama.port)
    }

    /// Generate a default config file content for display
    pub fn default_config_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config)
            .unwrap_or_else(|_| String::from("# Error generating config"))
    }
}
