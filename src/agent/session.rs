//! Turn scheduler
//!
//! A [`Session`] owns everything one multi-agent chat needs: roster,
//! participants, moderator, history, interaction log and the baton. Each user
//! message starts a conversation that runs turn after turn until the baton
//! reaches zero or an agent fails to answer.
//!
//! Turns are strictly sequential. A failed turn aborts the whole conversation:
//! nothing from it reaches history, memory or the log, and no other agent is
//! tried in its place.

use std::collections::HashMap;
use std::sync::Arc;

use crate::agent::conversation::ConversationHistory;
use crate::agent::interaction_log::InteractionLog;
use crate::agent::moderator::{Selection, SelectorSettings, SpeakerSelector};
use crate::agent::participant::Participant;
use crate::agent::roster::{load_roster, resolve_context, DirectoryDocumentStore, DocumentStore, Roster};
use crate::core::config::{BudgetConfig, BudgetMode, MemoryMode};
use crate::core::{truncate_text, AgentDescriptor, Config, Result, RoundtableError, Speaker, Utterance};
use crate::llm::{create_provider, LLMProvider, StreamCallback};

/// Where the scheduler is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No conversation has run yet
    Idle,
    /// A conversation is in flight
    Running,
    /// The last conversation used up its baton
    Ended,
    /// The last conversation stopped on a failed turn
    Aborted,
}

/// One completed agent turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    /// 1-based position within its conversation
    pub index: usize,
    pub speaker: String,
    pub text: String,
}

/// Result of a conversation that ran to the end of its baton
#[derive(Debug, Clone)]
pub struct ConversationOutcome {
    pub turns: Vec<Turn>,
    pub remaining_budget: usize,
}

/// Progress notifications for whoever renders the chat
#[derive(Debug, Clone)]
pub enum TurnEvent {
    ConversationStarted { budget: usize },
    SpeakerSelected { speaker: String, remaining: usize },
    /// A streamed fragment of the current speaker's reply
    Token { speaker: String, text: String },
    TurnCompleted(Turn),
    TurnFailed { speaker: String, error: String },
    ConversationEnded { turns: usize },
}

/// Callback receiving [`TurnEvent`]s
pub type TurnObserver = Arc<dyn Fn(&TurnEvent) + Send + Sync>;

/// A multi-agent chat session
pub struct Session {
    roster: Roster,
    participants: HashMap<String, Participant>,
    selector: SpeakerSelector,
    history: ConversationHistory,
    log: InteractionLog,
    budget: BudgetConfig,
    window: usize,
    streaming: bool,
    baton: usize,
    state: SessionState,
    last_speaker: Speaker,
    observer: Option<TurnObserver>,
}

impl Session {
    /// Build a session with role documents from disk and backends chosen by model name
    pub fn from_config(config: &Config) -> Result<Self> {
        let documents = DirectoryDocumentStore::new(&config.conversation.role_context_dir);
        Self::with_providers(config, &documents, |agent| create_provider(&agent.model, config))
    }

    /// Build a session, asking `provider_for` for each agent's backend
    pub fn with_providers<F>(
        config: &Config,
        documents: &dyn DocumentStore,
        mut provider_for: F,
    ) -> Result<Self>
    where
        F: FnMut(&AgentDescriptor) -> Result<Arc<dyn LLMProvider>>,
    {
        config.validate()?;
        let roster = load_roster(config)?;
        let conv = &config.conversation;

        let moderator = roster.moderator();
        let selector = SpeakerSelector::new(
            provider_for(moderator)?,
            moderator.model.clone(),
            SelectorSettings::from(conv),
        )
        .with_context(resolve_context(&moderator.id, &moderator.role, documents));

        let mut participants = HashMap::with_capacity(roster.len());
        for member in roster.members() {
            let context = resolve_context(&member.id, &member.role, documents);
            let mut participant = Participant::new(member.clone(), context, provider_for(member)?);
            if conv.memory == MemoryMode::PerAgent {
                participant = participant.with_memory(conv.agent_memory_limit);
            }
            log::debug!(
                "Agent '{}' uses {} model '{}'",
                member.id,
                participant.backend(),
                member.model
            );
            participants.insert(member.id.clone(), participant);
        }

        let log = match conv.log_file {
            Some(ref path) => InteractionLog::new(path, conv.log_truncate),
            None => InteractionLog::disabled(),
        };

        Ok(Self {
            roster,
            participants,
            selector,
            history: ConversationHistory::new(conv.history_limit),
            log,
            budget: conv.budget.clone(),
            window: conv.moderator_window.min(conv.history_limit),
            streaming: conv.streaming,
            baton: 0,
            state: SessionState::Idle,
            last_speaker: Speaker::User,
            observer: None,
        })
    }

    /// Receive turn events as they happen
    pub fn with_observer(mut self, observer: TurnObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Make the moderator's random fallback reproducible
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.selector = self.selector.with_seed(seed);
        self
    }

    /// Run one conversation in response to a user message
    ///
    /// Returns the completed turns once the baton is used up. If an agent fails,
    /// the conversation is aborted and the error names the agent; turns completed
    /// before it stay in history and the log.
    pub async fn submit(&mut self, user_text: &str) -> Result<ConversationOutcome> {
        if self.state == SessionState::Running {
            return Err(RoundtableError::ConversationInProgress);
        }

        self.history.push(Utterance::user(user_text));
        self.last_speaker = Speaker::User;
        self.state = SessionState::Running;

        // In moderated mode the first pick also fixes the baton for this conversation
        let mut pending: Option<Selection> = None;
        self.baton = match self.budget.mode {
            BudgetMode::Fixed => self.budget.turns,
            BudgetMode::Moderated => {
                let selection = self.select().await;
                let budget = selection.budget.unwrap_or(self.budget.turns);
                pending = Some(selection);
                budget
            }
        };

        log::info!("Conversation started: baton count {}", self.baton);
        self.emit(TurnEvent::ConversationStarted { budget: self.baton });

        let mut turns: Vec<Turn> = Vec::with_capacity(self.baton);
        while self.baton > 0 {
            let selection = match pending.take() {
                Some(selection) => selection,
                None => {
                    let selection = self.select().await;
                    if let Some(budget) = selection.budget {
                        log::debug!("Ignoring mid-conversation budget {} from moderator", budget);
                    }
                    selection
                }
            };

            self.emit(TurnEvent::SpeakerSelected {
                speaker: selection.speaker.clone(),
                remaining: self.baton,
            });

            match self.take_turn(&selection.speaker, turns.len() + 1).await {
                Ok(turn) => {
                    self.baton -= 1;
                    log::info!("Baton count decreased: {}", self.baton);
                    turns.push(turn);
                }
                Err(e) => {
                    self.state = SessionState::Aborted;
                    log::error!(
                        "Turn {} by '{}' failed, conversation aborted: {}",
                        turns.len() + 1,
                        selection.speaker,
                        e
                    );
                    self.emit(TurnEvent::TurnFailed {
                        speaker: selection.speaker.clone(),
                        error: e.to_string(),
                    });
                    return Err(RoundtableError::generation(selection.speaker, e));
                }
            }
        }

        self.state = SessionState::Ended;
        log::info!("Conversation ended after {} turns", turns.len());
        self.emit(TurnEvent::ConversationEnded { turns: turns.len() });

        Ok(ConversationOutcome {
            turns,
            remaining_budget: self.baton,
        })
    }

    async fn select(&mut self) -> Selection {
        self.selector
            .select_next(&self.history, &self.roster, &self.last_speaker)
            .await
    }

    /// Let `speaker` take one turn; on error nothing is recorded
    async fn take_turn(&mut self, speaker: &str, index: usize) -> Result<Turn> {
        let conversation = self.history.render(self.window);
        let on_token = self.token_callback(speaker);

        let participant = self
            .participants
            .get_mut(speaker)
            .ok_or_else(|| RoundtableError::Other(format!("'{}' is not on the roster", speaker)))?;

        let prompt = participant.build_prompt(&conversation);
        let reply = participant.respond(&prompt, on_token).await?;

        self.history.push(Utterance::agent(speaker, reply.clone()));
        self.log.record(speaker, &prompt, &reply);
        self.last_speaker = Speaker::agent(speaker);
        log::info!("{} response: {}", speaker, truncate_text(&reply, 100));

        let turn = Turn {
            index,
            speaker: speaker.to_string(),
            text: reply,
        };
        self.emit(TurnEvent::TurnCompleted(turn.clone()));
        Ok(turn)
    }

    fn token_callback(&self, speaker: &str) -> Option<StreamCallback> {
        if !self.streaming {
            return None;
        }
        let observer = self.observer.clone()?;
        let speaker = speaker.to_string();
        Some(Box::new(move |token: &str| {
            observer(&TurnEvent::Token {
                speaker: speaker.clone(),
                text: token.to_string(),
            })
        }))
    }

    fn emit(&self, event: TurnEvent) {
        if let Some(ref observer) = self.observer {
            observer(&event);
        }
    }

    /// Forget the conversation so far; refused while one is running
    pub fn clear_history(&mut self) -> Result<()> {
        if self.state == SessionState::Running {
            return Err(RoundtableError::ConversationInProgress);
        }
        self.history.clear();
        self.last_speaker = Speaker::User;
        Ok(())
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Turns left in the current (or last) conversation
    pub fn remaining_budget(&self) -> usize {
        self.baton
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn participant(&self, id: &str) -> Option<&Participant> {
        self.participants.get(id)
    }

    pub fn last_speaker(&self) -> &Speaker {
        &self.last_speaker
    }

    pub fn budget_mode(&self) -> BudgetMode {
        self.budget.mode
    }

    pub fn interaction_log(&self) -> &InteractionLog {
        &self.log
    }
}
