//! Roundtable - Moderated Multi-Agent Chat
//!
//! Main entry point for the CLI application.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use roundtable::core::config::{BudgetMode, MemoryMode};
use roundtable::{Config, Repl};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum MemoryArg {
    Shared,
    PerAgent,
}

/// Roundtable - Moderated Multi-Agent Chat
#[derive(Parser, Debug)]
#[command(name = "roundtable")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file (defaults to ~/.config/roundtable/config.toml)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Agent turns per user message
    #[arg(long, short = 't')]
    turns: Option<usize>,

    /// Let the moderator choose the number of turns
    #[arg(long, short = 'm')]
    moderated: bool,

    /// What each agent remembers between turns
    #[arg(long, value_enum)]
    memory: Option<MemoryArg>,

    /// Interaction log file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Disable the interaction log
    #[arg(long, conflicts_with = "log_file")]
    no_log: bool,

    /// Directory with `<agent>.md` role documents
    #[arg(long)]
    roles_dir: Option<PathBuf>,

    /// Print each reply once it is complete instead of streaming it
    #[arg(long)]
    no_stream: bool,

    /// Print the default configuration file and exit
    #[arg(long)]
    default_config: bool,

    /// Write the active configuration to the config file and exit
    #[arg(long)]
    save_config: bool,

    /// Enable debug output
    #[arg(long, short = 'd')]
    debug: bool,

    /// Single prompt mode (non-interactive)
    #[arg(long, short = 'p')]
    prompt: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.default_config {
        print!("{}", Config::default_config_toml());
        return Ok(());
    }

    // Build configuration
    let mut config = match args.config {
        Some(ref path) => {
            let _ = dotenvy::dotenv();
            Config::load_from_path(path)
                .with_context(|| format!("loading {}", path.display()))?
        }
        None => Config::load()?,
    };

    // Apply CLI overrides
    if let Some(turns) = args.turns {
        config.conversation.budget.turns = turns;
    }

    if args.moderated {
        config.conversation.budget.mode = BudgetMode::Moderated;
    }

    if let Some(memory) = args.memory {
        config.conversation.memory = match memory {
            MemoryArg::Shared => MemoryMode::Shared,
            MemoryArg::PerAgent => MemoryMode::PerAgent,
        };
    }

    if let Some(log_file) = args.log_file {
        config.conversation.log_file = Some(log_file);
    }

    if args.no_log {
        config.conversation.log_file = None;
    }

    if let Some(dir) = args.roles_dir {
        config.conversation.role_context_dir = dir;
    }

    if args.no_stream {
        config.conversation.streaming = false;
    }

    if args.debug {
        config.debug = true;
    }

    roundtable::init_logger(if config.debug { "debug" } else { "info" });

    if args.save_config {
        config.validate()?;
        config.save()?;
        println!("Saved {}", Config::config_file().display());
        return Ok(());
    }

    let mut repl = Repl::with_config(config)?;

    // Single prompt mode
    if let Some(prompt) = args.prompt {
        repl.run_once(&prompt).await?;
        return Ok(());
    }

    // Interactive REPL mode
    repl.run().await?;

    Ok(())
}
