//! A group room where the operator picks every speaker.
//!
//! Run with: OPENAI_API_KEY=... cargo run --example group_room --features openai-api

use llm_chatroom::backend::OpenAIAssistantsBackend;
use llm_chatroom::observability::{self, LogTarget, ObservabilityConfig};
use llm_chatroom::{AgentConfig, PollConfig, Room, RoomConfig, SeedAttribution, TurnPhase};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::Level;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    observability::init(ObservabilityConfig {
        level: Level::DEBUG,
        target: LogTarget::File("group_room.log".to_string()),
    })?;

    let backend = Arc::new(OpenAIAssistantsBackend::try_from_env()?);
    let config = RoomConfig::from_env()
        .with_seed_attribution(SeedAttribution::Unattributed)
        .with_poll(PollConfig::default().with_max_attempts(90));
    let room = Room::new(backend, config);

    let agents = [
        ("Alice", "👩", "an optimistic product manager"),
        ("Bob", "👨", "a sceptical backend engineer"),
        ("Carol", "🧑", "a pragmatic designer"),
    ]
    .map(|(name, avatar, persona)| {
        AgentConfig::new(
            name,
            avatar,
            format!(
                "You are {name}, {persona}. You are in a chat room with Alice, Bob and Carol. \
                 Messages from others are prefixed with their name."
            ),
        )
    });
    room.configure(&agents, "Should we rewrite the billing service this quarter?")
        .await?;

    let mut phase = room.subscribe_phase();
    let watcher = tokio::spawn(async move {
        while phase.changed().await.is_ok() {
            if let TurnPhase::Polling { agent_index, attempts, .. } = &*phase.borrow() {
                eprintln!("agent {agent_index} thinking ({attempts})...");
            }
        }
    });

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    for speaker in [1, 2, 0, 1] {
        let outcome = tokio::time::timeout(
            Duration::from_secs(300),
            room.take_turn_with_cancel(speaker, &cancel),
        )
        .await??;
        let name = &room.agents().await[outcome.agent_index].name;
        println!("{name}: {}\n", outcome.message.content);
    }

    watcher.abort();
    Ok(())
}
