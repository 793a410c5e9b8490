//! Append-only JSON-lines record of every completed turn
//!
//! Prompts and responses are cut to a fixed length so the file stays small.
//! Write failures go to the diagnostic log and never reach the conversation.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::core::{truncate_text, Result};

/// One line of the interaction log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub role: String,
    pub prompt: String,
    pub response: String,
}

/// Writer for the interaction log file
#[derive(Debug, Clone)]
pub struct InteractionLog {
    path: Option<PathBuf>,
    max_length: usize,
}

impl InteractionLog {
    /// Log to `path`, keeping at most `max_length` characters per field
    pub fn new(path: impl Into<PathBuf>, max_length: usize) -> Self {
        Self {
            path: Some(path.into()),
            max_length,
        }
    }

    /// A log that records nothing
    pub fn disabled() -> Self {
        Self {
            path: None,
            max_length: 0,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Build the entry that would be written for this turn
    pub fn entry(&self, speaker: &str, prompt: &str, response: &str) -> LogEntry {
        LogEntry {
            role: speaker.to_string(),
            prompt: truncate_text(prompt, self.max_length),
            response: truncate_text(response, self.max_length),
        }
    }

    /// Append one turn to the log
    pub fn record(&self, speaker: &str, prompt: &str, response: &str) {
        let Some(path) = self.path.as_deref() else {
            return;
        };

        let entry = self.entry(speaker, prompt, response);
        if let Err(e) = append_jsonl_line(path, &entry) {
            log::error!(
                "Failed to write interaction log '{}': {}",
                path.display(),
                e
            );
        }
    }
}

fn append_jsonl_line<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut line = serde_json::to_vec(value)?;
    line.push(b'\n');

    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    file.write_all(&line)?;
    file.flush()?;
    Ok(())
}

/// Read back every entry of an interaction log, skipping malformed lines
pub fn read_log(path: &Path) -> Result<Vec<LogEntry>> {
    let content = fs::read_to_string(path)?;
    let mut entries = Vec::new();
    for line in content.lines().filter(|l| !l.trim().is_empty()) {
        match serde_json::from_str::<LogEntry>(line) {
            Ok(entry) => entries.push(entry),
            Err(e) => log::warn!("Skipping malformed interaction log line: {}", e),
        }
    }
    Ok(entries)
}
