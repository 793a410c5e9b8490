//! Interactive REPL for Roundtable
//!
//! Provides the main user interaction loop and prints every agent turn as it
//! arrives.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use crate::agent::{Session, TurnEvent};
use crate::cli::commands::{handle_command, CommandResult};
use crate::core::{Config, Result};
use crate::llm::{LLMProvider, OllamaClient};

/// Interactive REPL (Read-Eval-Print Loop)
pub struct Repl {
    session: Session,
    config: Config,
}

impl Repl {
    /// Create a REPL with custom configuration
    pub fn with_config(config: Config) -> Result<Self> {
        let streaming = config.conversation.streaming;
        let session = Session::from_config(&config)?
            .with_observer(Arc::new(move |event: &TurnEvent| print_event(event, streaming)));

        Ok(Self { session, config })
    }

    /// Send a single message and print the resulting turns
    pub async fn run_once(&mut self, prompt: &str) -> Result<()> {
        self.session.submit(prompt).await?;
        println!();
        Ok(())
    }

    /// Run the REPL
    pub async fn run(&mut self) -> Result<()> {
        self.print_banner();

        let stdin = io::stdin();
        let mut stdout = io::stdout();

        loop {
            print!("You: ");
            stdout.flush()?;

            let mut input = String::new();
            match stdin.lock().read_line(&mut input) {
                Ok(0) => {
                    // EOF (Ctrl+D)
                    println!("\nGoodbye!");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    eprintln!("Error reading input: {}", e);
                    continue;
                }
            }

            match handle_command(&input, &mut self.session, &self.config) {
                Ok(CommandResult::Exit) => {
                    println!("\nGoodbye!");
                    break;
                }
                Ok(CommandResult::Clear) => {
                    println!("Conversation cleared.\n");
                }
                Ok(CommandResult::Handled(output)) => {
                    println!("{}\n", output);
                }
                Ok(CommandResult::ListModels) => match self.list_models().await {
                    Ok(models) if models.is_empty() => println!("No models found.\n"),
                    Ok(models) => println!("{}\n", models.join("\n")),
                    Err(e) => eprintln!("Could not list models: {}\n", e),
                },
                Ok(CommandResult::None) => {}
                Ok(CommandResult::Continue(message)) => {
                    if let Err(e) = self.session.submit(&message).await {
                        eprintln!("\nError while generating a response: {}\n", e);
                    } else {
                        println!();
                    }
                }
                Err(e) => {
                    eprintln!("Command error: {}\n", e);
                }
            }
        }

        Ok(())
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        OllamaClient::from_config(&self.config)?.list_models().await
    }

    /// Print the startup banner
    fn print_banner(&self) {
        let roster = self.session.roster();

        println!();
        println!("Roundtable - moderated multi-agent chat");
        println!("Ollama:     {}", self.config.ollama_url());
        println!(
            "Moderator:  {} ({})",
            roster.moderator().id,
            roster.moderator().model
        );
        println!("Agents:     {}", roster.member_ids().join(", "));
        println!();
        println!("Commands: help, roster, status, config, models, clear, exit");
        println!("─────────────────────────────────────────────────────");
    }
}

fn print_event(event: &TurnEvent, streaming: bool) {
    match event {
        TurnEvent::ConversationStarted { budget } => {
            println!("\n[{} turn(s)]", budget);
        }
        TurnEvent::SpeakerSelected { speaker, .. } if streaming => {
            print!("\n**{}**: ", speaker);
            let _ = io::stdout().flush();
        }
        TurnEvent::Token { text, .. } => {
            print!("{}", text);
            let _ = io::stdout().flush();
        }
        TurnEvent::TurnCompleted(turn) => {
            if streaming {
                println!();
            } else {
                println!("\n**{}**: {}", turn.speaker, turn.text);
            }
        }
        TurnEvent::TurnFailed { speaker, error } => {
            eprintln!("\n{} could not answer: {}", speaker, error);
        }
        _ => {}
    }
}
