//! The chat room aggregate.
//!
//! A [`Room`] owns everything that makes up one conversation: the agent
//! registry, the transcript, the replay cursors and a turn counter. All of it
//! sits behind a single async mutex that every turn holds from replay to
//! append, so at most one turn per room is ever in flight and the state is
//! only observed between turns. Separate rooms share nothing but the backend.

use crate::backend::AssistantBackend;
use crate::config::{RoomConfig, SeedAttribution};
use crate::error::ChatRoomError;
use crate::registry::{Agent, AgentConfig, AgentRegistry};
use crate::replay::ReplayResolver;
use crate::transcript::{Author, RoomMessage, TranscriptStore};
use crate::turn::{TurnExecutor, TurnOutcome, TurnPhase};
use std::sync::Arc;
use tokio::sync::{Mutex, watch};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Display information for the author of a transcript message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Speaker {
    pub name: String,
    pub avatar: Option<String>,
}

/// A consistent copy of the room taken between turns, for rendering.
#[derive(Debug, Clone, Default)]
pub struct RoomSnapshot {
    pub agents: Vec<Agent>,
    pub transcript: Vec<RoomMessage>,
    pub turns_taken: usize,
    seed_speaker_name: String,
}

impl RoomSnapshot {
    /// Resolves who a message should be rendered as.
    pub fn speaker_of(&self, message: &RoomMessage) -> Speaker {
        match message.author.agent_index().and_then(|i| self.agents.get(i)) {
            Some(agent) => Speaker {
                name: agent.name.clone(),
                avatar: Some(agent.avatar.clone()),
            },
            None => Speaker {
                name: self.seed_speaker_name.clone(),
                avatar: None,
            },
        }
    }
}

#[derive(Default)]
struct RoomState {
    registry: Option<AgentRegistry>,
    transcript: TranscriptStore,
    replay: ReplayResolver,
    turns_taken: usize,
}

/// A multi-agent chat room driven turn by turn.
///
/// # Examples
///
/// ```rust,ignore
/// use llm_chatroom::{AgentConfig, Room, RoomConfig};
/// use llm_chatroom::backend::OpenAIAssistantsBackend;
/// use std::sync::Arc;
///
/// let room = Room::new(Arc::new(OpenAIAssistantsBackend::try_from_env()?), RoomConfig::default());
/// room.configure(
///     &[
///         AgentConfig::new("Alice", "👩", "You are Alice. You are talking with Bob."),
///         AgentConfig::new("Bob", "👨", "You are Bob. You are talking with Alice."),
///     ],
///     "Hi! I'm Alice. How are you?",
/// )
/// .await?;
///
/// let outcome = room.take_turn(1).await?;
/// println!("Bob: {}", outcome.message.content);
/// ```
pub struct Room {
    backend: Arc<dyn AssistantBackend>,
    config: RoomConfig,
    state: Mutex<RoomState>,
    phase: watch::Sender<TurnPhase>,
}

impl Room {
    pub fn new(backend: Arc<dyn AssistantBackend>, config: RoomConfig) -> Self {
        let (phase, _) = watch::channel(TurnPhase::Idle);
        let replay = ReplayResolver::new(config.replay);
        Self {
            backend,
            config,
            state: Mutex::new(RoomState {
                replay,
                ..RoomState::default()
            }),
            phase,
        }
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    /// Watches the phase of the turn in flight.
    pub fn subscribe_phase(&self) -> watch::Receiver<TurnPhase> {
        self.phase.subscribe()
    }

    /// Creates the agents and starts a new transcript with `seed`.
    ///
    /// On failure the previous registry and transcript stay in place. On
    /// success both are replaced; the old conversation is discarded.
    pub async fn configure(
        &self,
        configs: &[AgentConfig],
        seed: impl Into<String>,
    ) -> Result<(), ChatRoomError> {
        let seed_author = match self.config.seed_attribution {
            SeedAttribution::Agent(index) if index >= configs.len() && !configs.is_empty() => {
                return Err(ChatRoomError::InvalidSeedAuthor {
                    index,
                    count: configs.len(),
                });
            }
            SeedAttribution::Agent(index) => Author::Agent(index),
            SeedAttribution::Unattributed => Author::Seed,
        };

        let mut state = self.state.lock().await;

        let registry = AgentRegistry::configure(
            self.backend.as_ref(),
            configs,
            &self.config.model,
            &self.config.tools,
        )
        .await?;

        let mut transcript = TranscriptStore::new();
        transcript.seed(seed, seed_author)?;

        state.registry = Some(registry);
        state.transcript = transcript;
        state.replay.reset();
        state.turns_taken = 0;

        info!(
            target = "llm_chatroom::room",
            agent_count = configs.len(),
            seed_author = ?seed_author,
            event = "room_configured"
        );
        Ok(())
    }

    /// Lets the agent at `agent_index` speak once.
    pub async fn take_turn(&self, agent_index: usize) -> Result<TurnOutcome, ChatRoomError> {
        self.take_turn_with_cancel(agent_index, &CancellationToken::new())
            .await
    }

    /// Like [`Room::take_turn`], aborting with [`ChatRoomError::Cancelled`]
    /// when `cancel` fires before the run finishes.
    ///
    /// Cancellation stops waiting; it does not cancel the remote run. That run
    /// stays active on the agent's thread, and backends that allow one active
    /// run per thread (OpenAI answers 400) reject the agent's next turn until
    /// the run finishes or expires. [`ChatRoomError::PollTimeout`] leaves the
    /// run behind in the same way.
    pub async fn take_turn_with_cancel(
        &self,
        agent_index: usize,
        cancel: &CancellationToken,
    ) -> Result<TurnOutcome, ChatRoomError> {
        let mut state = self.state.lock().await;
        self.run_locked(&mut state, agent_index, cancel).await
    }

    /// Index of the agent that speaks next in round-robin order: the one after
    /// the author of the last message, or the first agent after an
    /// unattributed seed.
    pub async fn next_in_rotation(&self) -> Result<usize, ChatRoomError> {
        let state = self.state.lock().await;
        next_in_rotation(&state)
    }

    /// Takes the next round-robin turn, as the two-party room's "Continue" does.
    pub async fn continue_conversation(&self) -> Result<TurnOutcome, ChatRoomError> {
        let mut state = self.state.lock().await;
        let agent_index = next_in_rotation(&state)?;
        self.run_locked(&mut state, agent_index, &CancellationToken::new())
            .await
    }

    pub async fn is_configured(&self) -> bool {
        self.state.lock().await.registry.is_some()
    }

    pub async fn transcript(&self) -> Vec<RoomMessage> {
        self.state.lock().await.transcript.all().to_vec()
    }

    pub async fn agents(&self) -> Vec<Agent> {
        let state = self.state.lock().await;
        state
            .registry
            .as_ref()
            .map(|registry| registry.agents().to_vec())
            .unwrap_or_default()
    }

    pub async fn turns_taken(&self) -> usize {
        self.state.lock().await.turns_taken
    }

    /// Copies agents and transcript in one consistent read.
    pub async fn snapshot(&self) -> RoomSnapshot {
        let state = self.state.lock().await;
        RoomSnapshot {
            agents: state
                .registry
                .as_ref()
                .map(|registry| registry.agents().to_vec())
                .unwrap_or_default(),
            transcript: state.transcript.all().to_vec(),
            turns_taken: state.turns_taken,
            seed_speaker_name: self.config.seed_speaker_name.clone(),
        }
    }

    /// Drops the agents and the conversation. Remote objects are left as they are.
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        state.registry = None;
        state.transcript = TranscriptStore::new();
        state.replay.reset();
        state.turns_taken = 0;
        info!(target = "llm_chatroom::room", event = "room_reset");
    }

    async fn run_locked(
        &self,
        state: &mut RoomState,
        agent_index: usize,
        cancel: &CancellationToken,
    ) -> Result<TurnOutcome, ChatRoomError> {
        let RoomState {
            registry,
            transcript,
            replay,
            turns_taken,
        } = state;
        let registry = registry.as_ref().ok_or(ChatRoomError::NotConfigured)?;

        let outcome = TurnExecutor::new(self.backend.as_ref(), &self.config)
            .with_phase_reporter(&self.phase)
            .take_turn(registry, transcript, replay, agent_index, cancel)
            .await?;

        *turns_taken += 1;
        Ok(outcome)
    }
}

fn next_in_rotation(state: &RoomState) -> Result<usize, ChatRoomError> {
    let registry = state.registry.as_ref().ok_or(ChatRoomError::NotConfigured)?;
    let next = match state.transcript.last().and_then(|m| m.author.agent_index()) {
        Some(index) => (index + 1) % registry.len(),
        None => 0,
    };
    Ok(next)
}
