//! Two agents taking turns, the way the two-party room's "Continue" button works.
//!
//! Run with: OPENAI_API_KEY=... cargo run --example two_party_room --features openai-api

use llm_chatroom::backend::OpenAIAssistantsBackend;
use llm_chatroom::observability::{self, ObservabilityConfig};
use llm_chatroom::{AgentConfig, Room, RoomConfig};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    observability::init(ObservabilityConfig::default())?;

    let backend = Arc::new(OpenAIAssistantsBackend::try_from_env()?);
    let room = Room::new(backend, RoomConfig::from_env());

    room.configure(
        &[
            AgentConfig::new(
                "Alice",
                "👩",
                "You are Alice. You are talking with Bob. Keep your answers short.",
            ),
            AgentConfig::new(
                "Bob",
                "👨",
                "You are Bob. You are talking with Alice. Keep your answers short.",
            ),
        ],
        "Hi! I'm Alice. How are you?",
    )
    .await?;

    for _ in 0..4 {
        room.continue_conversation().await?;
    }

    let snapshot = room.snapshot().await;
    for message in &snapshot.transcript {
        let speaker = snapshot.speaker_of(message);
        println!(
            "{} {}: {}",
            speaker.avatar.unwrap_or_default(),
            speaker.name,
            message.content
        );
    }

    Ok(())
}
