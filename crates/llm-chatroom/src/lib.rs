//! 'llm-chatroom' - Turn-by-turn multi-agent chat rooms on hosted assistant threads.
//!
//! An operator configures N agents (name, avatar, instructions), seeds the
//! conversation with one message, and then picks who speaks next. Every agent
//! owns a private remote thread; the room keeps the shared transcript and,
//! before each turn, replays into the speaker's thread exactly the messages it
//! has not seen yet.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use llm_chatroom::backend::OpenAIAssistantsBackend;
//! use llm_chatroom::{AgentConfig, Room, RoomConfig};
//! use std::sync::Arc;
//!
//! let backend = Arc::new(OpenAIAssistantsBackend::try_from_env()?);
//! let room = Room::new(backend, RoomConfig::from_env());
//!
//! room.configure(
//!     &[
//!         AgentConfig::new("Alice", "👩", "You are Alice. You are in a chat room."),
//!         AgentConfig::new("Bob", "👨", "You are Bob. You are in a chat room."),
//!         AgentConfig::new("Carol", "🧑", "You are Carol. You are in a chat room."),
//!     ],
//!     "Hi! I'm Alice. How are you guys?",
//! )
//! .await?;
//!
//! room.take_turn(2).await?; // Carol hears Alice's seed, prefixed "Alice: "
//! room.take_turn(1).await?; // Bob hears the seed and Carol's reply
//! ```
//!
//! # Modules
//!
//! - [`backend`]: the remote assistant contract and its OpenAI implementation
//! - [`registry`]: agents and their remote assistant/thread handles
//! - [`transcript`]: the append-only shared transcript
//! - [`replay`]: which messages an agent still has to see
//! - [`turn`]: replay, run, poll, append
//! - [`room`]: the aggregate tying it together with one turn in flight at a time
//!
//! # Feature Flags
//!
//! - `openai-api` - Enables [`backend::OpenAIAssistantsBackend`] (requires `reqwest`)

pub mod backend;
pub mod config;
pub mod error;
pub mod observability;
pub mod registry;
pub mod replay;
pub mod room;
pub mod transcript;
pub mod turn;

pub use backend::AssistantBackend;
pub use config::{
    MessageTemplates, NamePrefixPolicy, PollConfig, ReplayStrategy, RoomConfig, SeedAttribution,
};
pub use error::{BackendError, ChatRoomError};
pub use registry::{Agent, AgentConfig, AgentRegistry};
pub use replay::{ReplayResolver, pending_messages};
pub use room::{Room, RoomSnapshot, Speaker};
pub use transcript::{Author, RoomMessage, TranscriptStore};
pub use turn::{GenerationStatus, TurnExecutor, TurnOutcome, TurnPhase};
