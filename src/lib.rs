//! Roundtable - Moderated Multi-Agent Chat
//!
//! Several role-playing agents discuss a user's message. A moderator model
//! decides who speaks next (and, optionally, how many turns the discussion
//! gets); every turn is kept in a bounded history and written to a JSON-lines
//! interaction log.
//!
//! # Architecture
//!
//! - **Core**: Shared types, configuration, and error handling
//! - **LLM**: Provider abstraction with Ollama, OpenAI and Anthropic backends
//! - **Agent**: Roster, speaker selection, participants and the turn scheduler
//! - **CLI**: Command-line interface and REPL
//!
//! # Usage
//!
//! ```rust,no_run
//! use roundtable::{Config, Session};
//!
//! #[tokio::main]
//! async fn main() -> roundtable::Result<()> {
//!     let mut session = Session::from_config(&Config::load()?)?;
//!     let outcome = session.submit("Should we open a second cafe?").await?;
//!     for turn in outcome.turns {
//!         println!("{}: {}", turn.speaker, turn.text);
//!     }
//!     Ok(())
//! }
//! ```

use std::sync::Once;

pub mod agent;
pub mod cli;
pub mod core;
pub mod llm;

// Re-export commonly used items
pub use agent::{Session, SessionState, TurnEvent};
pub use cli::Repl;
pub use core::{Config, Result, RoundtableError};

static INIT_LOGGER: Once = Once::new();

/// Initialise the global [`env_logger`] exactly once
///
/// `RUST_LOG` wins over `default_filter`.
pub fn init_logger(default_filter: &str) {
    INIT_LOGGER.call_once(|| {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
            .init();
    });
}
