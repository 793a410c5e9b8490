//! Agent module - roster, moderation and turn scheduling
//!
//! Contains the session loop that passes the baton between agents, and the
//! pieces it is built from.

pub mod conversation;
pub mod interaction_log;
pub mod moderator;
pub mod participant;
pub mod roster;
pub mod session;

pub use conversation::{AgentMemory, ConversationHistory};
pub use interaction_log::{InteractionLog, LogEntry};
pub use moderator::{Selection, SelectorSettings, SpeakerSelector};
pub use participant::Participant;
pub use roster::{load_roster, resolve_context, DirectoryDocumentStore, DocumentStore, MemoryDocumentStore, Roster};
pub use session::{ConversationOutcome, Session, SessionState, Turn, TurnEvent, TurnObserver};
