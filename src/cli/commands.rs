//! CLI commands
//!
//! Special commands that can be executed in the REPL. A command is only
//! recognised when it is the whole input line, so chat messages that happen
//! to start with "help" or "status" still reach the agents.

use crate::agent::Session;
use crate::core::{Config, Result};

/// Result of parsing a command
#[derive(Debug, PartialEq, Eq)]
pub enum CommandResult {
    /// Continue processing as normal input
    Continue(String),
    /// Command was handled, show output
    Handled(String),
    /// Exit the REPL
    Exit,
    /// Clear history
    Clear,
    /// List the models the Ollama server has pulled
    ListModels,
    /// No output needed
    None,
}

/// Parse and handle special commands
pub fn handle_command(input: &str, session: &mut Session, config: &Config) -> Result<CommandResult> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(CommandResult::None);
    }

    match input.to_lowercase().as_str() {
        "exit" | "quit" | "q" => Ok(CommandResult::Exit),

        "clear" | "reset" => {
            session.clear_history()?;
            Ok(CommandResult::Clear)
        }

        "help" | "?" => Ok(CommandResult::Handled(help_text())),

        "roster" | "agents" => Ok(CommandResult::Handled(roster_text(session))),

        "status" => Ok(CommandResult::Handled(status_text(session))),

        "models" => Ok(CommandResult::ListModels),

        "config" => Ok(CommandResult::Handled(format!(
            "Config file: {}\n\n{}",
            Config::config_file().display(),
            toml::to_string_pretty(config).unwrap_or_else(|e| format!("# {}", e))
        ))),

        _ => Ok(CommandResult::Continue(input.to_string())),
    }
}

fn roster_text(session: &Session) -> String {
    let roster = session.roster();
    let mut lines = vec![format!(
        "Moderator: {} ({})",
        roster.moderator().id,
        roster.moderator().model
    )];
    lines.push("Agents:".to_string());
    for member in roster.members() {
        lines.push(format!("  - {} ({}): {}", member.id, member.model, member.role));
    }
    lines.join("\n")
}

fn status_text(session: &Session) -> String {
    let history = session.history();
    format!(
        "Roundtable Status:\n\
         ─────────────────────────────\n\
         State:        {:?}\n\
         Budget mode:  {:?}\n\
         Baton:        {}\n\
         History:      {}/{} utterances\n\
         Last speaker: {}\n\
         Log file:     {}",
        session.state(),
        session.budget_mode(),
        session.remaining_budget(),
        history.len(),
        history.capacity(),
        session.last_speaker(),
        session
            .interaction_log()
            .path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "disabled".to_string())
    )
}

/// Help text for the REPL
pub fn help_text() -> String {
    r#"Roundtable Commands:
─────────────────────────────
  help, ?      Show this help
  roster       List the moderator and agents
  status       Show session state and baton count
  config       Show the active configuration
  models       List models available on the Ollama server
  clear        Forget the conversation so far
  exit, quit   Leave

Anything else is sent to the agents as your message."#
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::MemoryDocumentStore;
    use crate::core::{Message, RoundtableError};
    use crate::llm::{GenerateOptions, LLMProvider, LLMResponse};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct Silent;

    #[async_trait]
    impl LLMProvider for Silent {
        async fn chat(
            &self,
            _model: &str,
            _messages: &[Message],
            _options: Option<GenerateOptions>,
        ) -> Result<LLMResponse> {
            Err(RoundtableError::provider("silent", "no backend in tests"))
        }

        fn name(&self) -> &str {
            "silent"
        }
    }

    fn session(config: &Config) -> Session {
        match Session::with_providers(config, &MemoryDocumentStore::new(), |_| {
            Ok(Arc::new(Silent) as Arc<dyn LLMProvider>)
        }) {
            Ok(session) => session,
            Err(e) => panic!("session should build: {}", e),
        }
    }

    #[test]
    fn test_commands_need_whole_line() {
        let mut config = Config::default();
        config.conversation.log_file = None;
        let mut session = session(&config);

        assert_eq!(
            handle_command("exit", &mut session, &config).unwrap(),
            CommandResult::Exit
        );
        assert_eq!(
            handle_command("help me pick a name", &mut session, &config).unwrap(),
            CommandResult::Continue("help me pick a name".to_string())
        );
        assert_eq!(
            handle_command("   ", &mut session, &config).unwrap(),
            CommandResult::None
        );
    }

    #[test]
    fn test_roster_and_status_output() {
        let mut config = Config::default();
        config.conversation.log_file = None;
        let mut session = session(&config);

        match handle_command("roster", &mut session, &config).unwrap() {
            CommandResult::Handled(text) => {
                assert!(text.contains("Moderator: moderator"));
                assert!(text.contains("critic"));
            }
            other => panic!("unexpected {:?}", other),
        }
        match handle_command("status", &mut session, &config).unwrap() {
            CommandResult::Handled(text) => {
                assert!(text.contains("Idle"));
                assert!(text.contains("disabled"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
