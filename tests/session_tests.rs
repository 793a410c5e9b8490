//! Turn scheduler integration tests
//!
//! Runs whole conversations against scripted backends: no network needed.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::FutureExt;

use roundtable::agent::interaction_log::read_log;
use roundtable::agent::MemoryDocumentStore;
use roundtable::core::config::{AgentEntry, BudgetMode, MemoryMode, MODERATOR_ID};
use roundtable::core::{Message, Speaker};
use roundtable::llm::{GenerateOptions, LLMProvider, LLMResponse, StreamCallback};
use roundtable::{Config, Result, RoundtableError, Session, SessionState, TurnEvent};

/// Moderator that replays a script, then answers with nothing usable
#[derive(Default)]
struct ScriptedModerator {
    replies: Mutex<VecDeque<String>>,
    fail: bool,
}

impl ScriptedModerator {
    fn new(replies: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            fail: false,
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Default::default()
        })
    }
}

#[async_trait]
impl LLMProvider for ScriptedModerator {
    async fn chat(
        &self,
        model: &str,
        _messages: &[Message],
        _options: Option<GenerateOptions>,
    ) -> Result<LLMResponse> {
        if self.fail {
            return Err(RoundtableError::provider("scripted", "moderator offline"));
        }
        let reply = self.replies.lock().unwrap().pop_front().unwrap_or_default();
        Ok(LLMResponse::text(model, reply))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Agents that answer "<id> says point <n>", or fail when told to
#[derive(Default)]
struct ScriptedAgents {
    failing: HashSet<String>,
    counts: Mutex<HashMap<String, usize>>,
    calls: Mutex<Vec<(String, Vec<Message>)>>,
}

impl ScriptedAgents {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn failing(ids: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            failing: ids.iter().map(|id| id.to_string()).collect(),
            ..Default::default()
        })
    }

    fn calls_for(&self, id: &str) -> Vec<Vec<Message>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(caller, _)| caller == id)
            .map(|(_, messages)| messages.clone())
            .collect()
    }

    fn caller(messages: &[Message]) -> String {
        messages
            .first()
            .and_then(|m| m.content.strip_prefix("Your role is "))
            .and_then(|rest| rest.split(':').next())
            .unwrap_or_default()
            .to_string()
    }
}

#[async_trait]
impl LLMProvider for ScriptedAgents {
    async fn chat(
        &self,
        model: &str,
        messages: &[Message],
        _options: Option<GenerateOptions>,
    ) -> Result<LLMResponse> {
        let id = Self::caller(messages);
        self.calls
            .lock()
            .unwrap()
            .push((id.clone(), messages.to_vec()));

        if self.failing.contains(&id) {
            return Err(RoundtableError::provider("scripted", format!("{} is unavailable", id)));
        }

        let mut counts = self.counts.lock().unwrap();
        let n = counts.entry(id.clone()).or_insert(0);
        *n += 1;
        Ok(LLMResponse::text(model, format!("{} says point {}", id, n)))
    }

    async fn chat_stream(
        &self,
        model: &str,
        messages: &[Message],
        options: Option<GenerateOptions>,
        on_token: StreamCallback,
    ) -> Result<LLMResponse> {
        let response = self.chat(model, messages, options).await?;
        for piece in response.content.split_inclusive(' ') {
            on_token(piece);
        }
        Ok(response)
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Agent backend that never answers
struct Stalled;

#[async_trait]
impl LLMProvider for Stalled {
    async fn chat(
        &self,
        _model: &str,
        _messages: &[Message],
        _options: Option<GenerateOptions>,
    ) -> Result<LLMResponse> {
        futures::future::pending().await
    }

    fn name(&self) -> &str {
        "stalled"
    }
}

fn base_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.conversation.log_file = Some(dir.join("agent_interactions.jsonl"));
    config.conversation.streaming = false;
    config
}

fn build_session(
    config: &Config,
    moderator: Arc<dyn LLMProvider>,
    agents: Arc<dyn LLMProvider>,
) -> Session {
    let session = Session::with_providers(config, &MemoryDocumentStore::new(), |agent| {
        if agent.id == MODERATOR_ID {
            Ok(moderator.clone())
        } else {
            Ok(agents.clone())
        }
    });
    match session {
        Ok(session) => session.with_seed(7),
        Err(e) => panic!("session should build: {}", e),
    }
}

fn speakers(turns: &[roundtable::agent::Turn]) -> Vec<&str> {
    turns.iter().map(|t| t.speaker.as_str()).collect()
}

fn assert_no_repeats(turns: &[roundtable::agent::Turn]) {
    for pair in turns.windows(2) {
        assert_ne!(pair[0].speaker, pair[1].speaker, "same agent spoke twice in a row");
    }
}

#[tokio::test]
async fn test_fixed_budget_runs_exact_turns() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = base_config(dir.path());
    config.conversation.budget.turns = 3;

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let mut session = build_session(
        &config,
        ScriptedModerator::new(&["critic", "analyst", "strategist"]),
        ScriptedAgents::new(),
    )
    .with_observer(Arc::new(move |e: &TurnEvent| sink.lock().unwrap().push(e.clone())));

    assert_eq!(session.state(), SessionState::Idle);
    let outcome = session.submit("Should we open a second cafe?").await.unwrap();

    assert_eq!(speakers(&outcome.turns), vec!["critic", "analyst", "strategist"]);
    assert_eq!(outcome.turns[0].text, "critic says point 1");
    assert_eq!(outcome.turns[2].index, 3);
    assert_eq!(outcome.remaining_budget, 0);
    assert_eq!(session.state(), SessionState::Ended);
    assert_eq!(session.last_speaker(), &Speaker::agent("strategist"));

    let history: Vec<String> = session.history().iter().map(|u| u.to_string()).collect();
    assert_eq!(history[0], "user: Should we open a second cafe?");
    assert_eq!(history[1], "critic: critic says point 1");
    assert_eq!(history.len(), 4);

    let entries = read_log(&dir.path().join("agent_interactions.jsonl")).unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[1].role, "analyst");
    assert!(entries[0].prompt.starts_with("Conversation:\nuser: Should we"));

    // Baton seen before each turn only ever goes down
    let remaining: Vec<usize> = events
        .lock()
        .unwrap()
        .iter()
        .filter_map(|e| match e {
            TurnEvent::SpeakerSelected { remaining, .. } => Some(*remaining),
            _ => None,
        })
        .collect();
    assert_eq!(remaining, vec![3, 2, 1]);
}

#[tokio::test]
async fn test_moderated_budget_is_clamped_and_set_once() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = base_config(dir.path());
    config.conversation.budget.mode = BudgetMode::Moderated;
    config.conversation.budget.min_turns = 1;
    config.conversation.budget.max_turns = 5;

    let mut session = build_session(
        &config,
        ScriptedModerator::new(&["critic:9", "analyst:2"]),
        ScriptedAgents::new(),
    );

    let outcome = session.submit("Plan the launch").await.unwrap();

    // 9 clamps to 5; the later "analyst:2" does not shrink the baton
    assert_eq!(outcome.turns.len(), 5);
    assert_eq!(&speakers(&outcome.turns)[..2], &["critic", "analyst"]);
    assert_no_repeats(&outcome.turns);
    assert_eq!(session.budget_mode(), BudgetMode::Moderated);
}

#[tokio::test]
async fn test_moderated_budget_without_number_gives_one_turn() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = base_config(dir.path());
    config.conversation.budget.mode = BudgetMode::Moderated;

    let mut session = build_session(
        &config,
        ScriptedModerator::new(&["critic:lots"]),
        ScriptedAgents::new(),
    );

    let outcome = session.submit("Quick question").await.unwrap();
    assert_eq!(speakers(&outcome.turns), vec!["critic"]);
}

#[tokio::test]
async fn test_failed_turn_aborts_conversation() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = base_config(dir.path());
    config.conversation.budget.turns = 3;

    let agents = ScriptedAgents::failing(&["critic"]);
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let mut session = build_session(
        &config,
        ScriptedModerator::new(&["analyst", "critic", "strategist", "analyst", "strategist"]),
        agents.clone(),
    )
    .with_observer(Arc::new(move |e: &TurnEvent| sink.lock().unwrap().push(e.clone())));

    let err = session.submit("Review the budget").await.unwrap_err();

    assert!(err.is_generation_failure());
    match err {
        RoundtableError::Generation { ref speaker, .. } => assert_eq!(speaker, "critic"),
        ref other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(session.state(), SessionState::Aborted);
    assert_eq!(session.remaining_budget(), 2);
    assert_eq!(session.history().len(), 2);

    // No other agent stands in for the failed one
    assert!(agents.calls_for("strategist").is_empty());

    let entries = read_log(&dir.path().join("agent_interactions.jsonl")).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].role, "analyst");

    {
        let seen = events.lock().unwrap();
        assert!(seen
            .iter()
            .any(|e| matches!(e, TurnEvent::TurnFailed { speaker, .. } if speaker == "critic")));
        assert!(!seen
            .iter()
            .any(|e| matches!(e, TurnEvent::ConversationEnded { .. })));
    }

    // The next message starts a fresh conversation with a full baton
    let outcome = session.submit("Try again without the critic").await.unwrap();
    assert_eq!(speakers(&outcome.turns), vec!["strategist", "analyst", "strategist"]);
    assert_eq!(outcome.remaining_budget, 0);
    assert_eq!(session.state(), SessionState::Ended);
    assert_eq!(session.history().len(), 6);

    let entries = read_log(&dir.path().join("agent_interactions.jsonl")).unwrap();
    assert_eq!(entries.len(), 4);

    let seen = events.lock().unwrap();
    let started: Vec<usize> = seen
        .iter()
        .filter_map(|e| match e {
            TurnEvent::ConversationStarted { budget } => Some(*budget),
            _ => None,
        })
        .collect();
    assert_eq!(started, vec![3, 3]);
    assert!(matches!(seen.last(), Some(TurnEvent::ConversationEnded { turns: 3 })));
}

#[tokio::test]
async fn test_moderator_cannot_pick_same_agent_twice() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = base_config(dir.path());
    config.conversation.budget.turns = 6;

    let mut session = build_session(
        &config,
        ScriptedModerator::new(&["critic"; 6]),
        ScriptedAgents::new(),
    );

    let outcome = session.submit("Debate").await.unwrap();
    assert_eq!(outcome.turns.len(), 6);
    assert_eq!(outcome.turns[0].speaker, "critic");
    assert_no_repeats(&outcome.turns);
}

#[tokio::test]
async fn test_off_roster_and_failed_moderator_fall_back() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = base_config(dir.path());
    config.conversation.budget.turns = 4;

    let mut session = build_session(
        &config,
        ScriptedModerator::new(&["the ghost", "", "**Critic**", "user"]),
        ScriptedAgents::new(),
    );
    let outcome = session.submit("Anyone?").await.unwrap();
    assert_eq!(outcome.turns.len(), 4);
    assert_no_repeats(&outcome.turns);
    let roster = ["analyst", "critic", "strategist"];
    assert!(outcome.turns.iter().all(|t| roster.contains(&t.speaker.as_str())));

    let mut offline = build_session(&config, ScriptedModerator::failing(), ScriptedAgents::new());
    let outcome = offline.submit("Anyone at all?").await.unwrap();
    assert_eq!(outcome.turns.len(), 4);
    assert_no_repeats(&outcome.turns);
}

#[tokio::test]
async fn test_submit_while_running_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = base_config(dir.path());

    let mut session = build_session(&config, ScriptedModerator::new(&["critic"]), Arc::new(Stalled));

    // Poll once: the moderator answers, the agent never does
    assert!(session.submit("first").now_or_never().is_none());
    assert_eq!(session.state(), SessionState::Running);

    let history_len = session.history().len();
    let err = session.submit("second").await.unwrap_err();
    assert!(matches!(err, RoundtableError::ConversationInProgress));
    assert!(matches!(
        session.clear_history(),
        Err(RoundtableError::ConversationInProgress)
    ));
    assert_eq!(session.history().len(), history_len);
}

#[tokio::test]
async fn test_per_agent_memory_carries_own_exchanges() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = base_config(dir.path());
    config.conversation.budget.turns = 3;
    config.conversation.memory = MemoryMode::PerAgent;

    let agents = ScriptedAgents::new();
    let mut session = build_session(
        &config,
        ScriptedModerator::new(&["analyst", "critic", "analyst"]),
        agents.clone(),
    );
    session.submit("Price the product").await.unwrap();

    let calls = agents.calls_for("analyst");
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].len(), 2);
    // system, earlier prompt, earlier reply, new prompt
    assert_eq!(calls[1].len(), 4);
    assert_eq!(calls[1][2].role, "assistant");
    assert_eq!(calls[1][2].content, "analyst says point 1");
    assert!(calls[1][3].content.contains("critic: critic says point 1"));

    let memory = session.participant("analyst").unwrap().memory().unwrap();
    assert_eq!(memory.len(), 4);
}

#[tokio::test]
async fn test_shared_memory_sends_only_context_and_prompt() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = base_config(dir.path());
    config.conversation.budget.turns = 3;
    config.conversation.memory = MemoryMode::Shared;

    let agents = ScriptedAgents::new();
    let mut session = build_session(
        &config,
        ScriptedModerator::new(&["analyst", "critic", "analyst"]),
        agents.clone(),
    );
    session.submit("Price the product").await.unwrap();

    let calls = agents.calls_for("analyst");
    assert_eq!(calls[1].len(), 2);
    assert_eq!(calls[1][0].role, "system");
    assert!(session.participant("analyst").unwrap().memory().is_none());
}

#[tokio::test]
async fn test_streamed_tokens_reach_observer() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = base_config(dir.path());
    config.conversation.budget.turns = 2;
    config.conversation.streaming = true;

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let mut session = build_session(
        &config,
        ScriptedModerator::new(&["strategist", "critic"]),
        ScriptedAgents::new(),
    )
    .with_observer(Arc::new(move |e: &TurnEvent| sink.lock().unwrap().push(e.clone())));

    let outcome = session.submit("Go").await.unwrap();

    let events = events.lock().unwrap();
    let streamed: String = events
        .iter()
        .filter_map(|e| match e {
            TurnEvent::Token { speaker, text } if speaker == "strategist" => Some(text.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(streamed, outcome.turns[0].text);

    assert!(matches!(events.first(), Some(TurnEvent::ConversationStarted { budget: 2 })));
    assert!(matches!(events.last(), Some(TurnEvent::ConversationEnded { turns: 2 })));
}

#[tokio::test]
async fn test_history_is_bounded_and_clearable() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = base_config(dir.path());
    config.conversation.history_limit = 5;
    config.conversation.moderator_window = 3;
    config.conversation.budget.turns = 6;

    let mut session = build_session(&config, ScriptedModerator::new(&[]), ScriptedAgents::new());
    session.submit("Long one").await.unwrap();

    assert_eq!(session.history().len(), 5);
    assert_eq!(session.history().capacity(), 5);
    // The opening user message has been evicted
    assert!(session.history().iter().all(|u| u.speaker != Speaker::User));

    session.clear_history().unwrap();
    assert!(session.history().is_empty());
    assert_eq!(session.last_speaker(), &Speaker::User);

    let outcome = session.submit("Fresh start").await.unwrap();
    assert_eq!(outcome.turns.len(), 6);
}

#[tokio::test]
async fn test_roster_needs_two_members() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = base_config(dir.path());
    config.agents.clear();
    config
        .agents
        .insert(MODERATOR_ID.to_string(), AgentEntry::new("picks speakers", "llama3"));
    config
        .agents
        .insert("solo".to_string(), AgentEntry::new("talks alone", "llama3"));

    let result = Session::with_providers(&config, &MemoryDocumentStore::new(), |_| {
        Ok(ScriptedAgents::new() as Arc<dyn LLMProvider>)
    });
    match result {
        Ok(_) => panic!("a one-member roster should be rejected"),
        Err(e) => assert!(matches!(e, RoundtableError::Config(_))),
    }
}

#[tokio::test]
async fn test_role_documents_reach_system_message() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = base_config(dir.path());
    config.conversation.budget.turns = 1;

    let mut documents = MemoryDocumentStore::new();
    documents.insert("critic", "Always ask what could go wrong.");

    let agents = ScriptedAgents::new();
    let moderator: Arc<dyn LLMProvider> = ScriptedModerator::new(&["critic"]);
    let agent_backend: Arc<dyn LLMProvider> = agents.clone();
    let mut session = Session::with_providers(&config, &documents, |agent| {
        if agent.id == MODERATOR_ID {
            Ok(moderator.clone())
        } else {
            Ok(agent_backend.clone())
        }
    })
    .map_err(|e| e.to_string())
    .unwrap();

    session.submit("Ship it?").await.unwrap();

    let calls = agents.calls_for("critic");
    let system = &calls[0][0].content;
    assert!(system.starts_with("Your role is critic: "));
    assert!(system.ends_with("\n\nAlways ask what could go wrong."));
}
