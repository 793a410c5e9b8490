//! Speaker selection
//!
//! The moderator model is asked who should talk next, and optionally for how
//! many turns. Its reply is never trusted: anything off-roster, a repeat of the
//! previous speaker, or a failed call falls back to a uniformly random pick
//! among the other members.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::SeedableRng;

use crate::agent::conversation::ConversationHistory;
use crate::agent::roster::Roster;
use crate::core::config::{BudgetMode, ConversationConfig};
use crate::core::{truncate_text, Message, Speaker};
use crate::llm::{GenerateOptions, LLMProvider};

/// Outcome of one selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Canonical identifier of the next speaker
    pub speaker: String,
    /// Turn budget named by the moderator, already clamped
    pub budget: Option<usize>,
}

/// Knobs for the selector, usually derived from [`ConversationConfig`]
#[derive(Debug, Clone)]
pub struct SelectorSettings {
    /// How many recent utterances the moderator sees
    pub window: usize,
    /// Ask the moderator for `name:turns` instead of a bare name
    pub ask_for_budget: bool,
    pub min_turns: usize,
    pub max_turns: usize,
}

impl From<&ConversationConfig> for SelectorSettings {
    fn from(config: &ConversationConfig) -> Self {
        Self {
            window: config.moderator_window.min(config.history_limit),
            ask_for_budget: config.budget.mode == BudgetMode::Moderated,
            min_turns: config.budget.min_turns,
            max_turns: config.budget.max_turns,
        }
    }
}

/// Picks the next speaker by consulting the moderator model
pub struct SpeakerSelector {
    llm: Arc<dyn LLMProvider>,
    model: String,
    context: Option<String>,
    settings: SelectorSettings,
    rng: StdRng,
}

impl SpeakerSelector {
    pub fn new(llm: Arc<dyn LLMProvider>, model: impl Into<String>, settings: SelectorSettings) -> Self {
        Self {
            llm,
            model: model.into(),
            context: None,
            settings,
            rng: StdRng::from_os_rng(),
        }
    }

    /// Standing instructions sent as the moderator's system message
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Make the random fallback reproducible
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn settings(&self) -> &SelectorSettings {
        &self.settings
    }

    /// Choose who speaks after `last_speaker`
    ///
    /// Always returns a roster member different from `last_speaker`.
    pub async fn select_next(
        &mut self,
        history: &ConversationHistory,
        roster: &Roster,
        last_speaker: &Speaker,
    ) -> Selection {
        let prompt = self.build_prompt(history, roster, last_speaker);

        let mut messages = Vec::with_capacity(2);
        if let Some(ref context) = self.context {
            messages.push(Message::system(context.clone()));
        }
        messages.push(Message::user(prompt));

        let reply = match self
            .llm
            .chat(&self.model, &messages, Some(GenerateOptions::deterministic()))
            .await
        {
            Ok(response) => response.content,
            Err(e) => {
                log::warn!("Moderator call failed, picking a speaker at random: {}", e);
                return Selection {
                    speaker: self.random_other(roster, last_speaker),
                    budget: None,
                };
            }
        };

        self.interpret(&reply, roster, last_speaker)
    }

    /// Turn a raw moderator reply into a valid selection
    pub fn interpret(&mut self, reply: &str, roster: &Roster, last_speaker: &Speaker) -> Selection {
        let (candidate, budget) =
            parse_reply(reply, self.settings.min_turns, self.settings.max_turns);

        let speaker = match roster.find(&candidate) {
            Some(member) if !last_speaker.is_agent(&member.id) => member.id.clone(),
            Some(member) => {
                log::warn!(
                    "Moderator picked '{}' who just spoke. Selecting randomly from others.",
                    member.id
                );
                self.random_other(roster, last_speaker)
            }
            None => {
                log::warn!(
                    "Invalid speaker selected: '{}'. Selecting randomly from others.",
                    truncate_text(&candidate, 40)
                );
                self.random_other(roster, last_speaker)
            }
        };

        Selection { speaker, budget }
    }

    fn build_prompt(
        &self,
        history: &ConversationHistory,
        roster: &Roster,
        last_speaker: &Speaker,
    ) -> String {
        let names = roster.member_ids().join(", ");
        let mut prompt = format!(
            "Conversation:\n{}\n\nChoose the next speaker from: {}.",
            history.render(self.settings.window),
            names
        );

        if let Speaker::Agent(ref id) = last_speaker {
            prompt.push_str(&format!(" {} has just spoken and cannot go again.", id));
        }

        if self.settings.ask_for_budget {
            prompt.push_str(&format!(
                "\nAlso decide how many more turns the discussion needs, between {} and {}. \
                 Reply in the form name:turns and nothing else.",
                self.settings.min_turns, self.settings.max_turns
            ));
        } else {
            prompt.push_str("\nReply with the chosen role name only.");
        }
        prompt
    }

    /// Uniform pick among members other than `last_speaker`
    fn random_other(&mut self, roster: &Roster, last_speaker: &Speaker) -> String {
        let candidates: Vec<&str> = roster
            .member_ids()
            .into_iter()
            .filter(|id| !last_speaker.is_agent(id))
            .collect();

        match candidates.choose(&mut self.rng) {
            Some(id) => id.to_string(),
            // Roster::new guarantees two members, so someone else always exists
            None => roster.members()[0].id.clone(),
        }
    }
}

/// Normalize a moderator reply into `(speaker, budget)`
///
/// `name:count` yields a budget clamped into `[min, max]`, however many digits
/// the count has; a count that is not an integer counts as 1. A bare name
/// yields no budget.
pub fn parse_reply(raw: &str, min: usize, max: usize) -> (String, Option<usize>) {
    let normalized = raw
        .trim()
        .trim_matches(|c| matches!(c, '"' | '\'' | '`' | '*'))
        .trim()
        .to_lowercase();

    match normalized.split_once(':') {
        Some((name, count)) => {
            let count = count.trim();
            let digits = count.strip_prefix('-').unwrap_or(count);
            let all_digits = !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit());
            let turns = match count.parse::<i64>() {
                Ok(n) => n,
                // Too many digits for i64: clamp like any other out-of-range count
                Err(_) if all_digits && count.starts_with('-') => min as i64,
                Err(_) if all_digits => max as i64,
                Err(_) => {
                    log::warn!("Moderator gave a non-numeric turn count '{}', using 1", count);
                    1
                }
            };
            let clamped = turns.min(max as i64).max(min as i64) as usize;
            (name.trim().to_string(), Some(clamped))
        }
        None => (normalized, None),
    }
}
