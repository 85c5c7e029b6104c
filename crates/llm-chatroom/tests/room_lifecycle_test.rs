mod common;

use common::{ScriptedBackend, alice_and_bob, group_of_three};
use llm_chatroom::{Author, ChatRoomError, Room, RoomConfig, SeedAttribution, Speaker};
use serde_json::json;
use std::sync::Arc;

fn room(backend: &Arc<ScriptedBackend>, config: RoomConfig) -> Room {
    Room::new(backend.clone(), config)
}

#[tokio::test]
async fn test_configure_creates_one_assistant_and_thread_per_agent() {
    let backend = Arc::new(ScriptedBackend::new());
    let config = RoomConfig::default()
        .with_model("gpt-4o-mini")
        .with_tools(vec![json!({"type": "code_interpreter"})]);
    let room = room(&backend, config);

    room.configure(&group_of_three(), "Hi! I'm Alice.").await.unwrap();

    assert!(room.is_configured().await);
    assert_eq!(backend.thread_count(), 3);

    let assistants = backend.assistants();
    assert_eq!(assistants.len(), 3);
    assert_eq!(assistants[1].name, "Bob");
    assert_eq!(assistants[1].instructions, "You are Bob. You are in a chat room.");
    assert!(assistants.iter().all(|a| a.model == "gpt-4o-mini"));
    assert!(
        assistants
            .iter()
            .all(|a| a.tools == vec![json!({"type": "code_interpreter"})])
    );

    let agents = room.agents().await;
    let names: Vec<_> = agents.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["Alice", "Bob", "Carol"]);
    for (position, agent) in agents.iter().enumerate() {
        assert_eq!(agent.index, position);
    }

    let transcript = room.transcript().await;
    assert_eq!(transcript.len(), 1);
    assert_eq!(transcript[0].author, Author::Agent(0));
    assert_eq!(transcript[0].content, "Hi! I'm Alice.");
}

#[tokio::test]
async fn test_failed_configure_keeps_previous_room() {
    let backend = Arc::new(ScriptedBackend::new());
    let room = room(&backend, RoomConfig::default());
    room.configure(&alice_and_bob(), "first seed").await.unwrap();
    room.take_turn(1).await.unwrap();

    // Calls 1 and 2 created Alice and Bob; the second agent of the new set fails.
    backend.fail_create_assistant_call(4);
    let err = room
        .configure(&group_of_three(), "second seed")
        .await
        .unwrap_err();

    match err {
        ChatRoomError::Configuration { agent, .. } => assert_eq!(agent, "Bob"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(room.agents().await.len(), 2);
    let transcript = room.transcript().await;
    assert_eq!(transcript.len(), 2);
    assert_eq!(transcript[0].content, "first seed");
    assert_eq!(room.turns_taken().await, 1);
}

#[tokio::test]
async fn test_reconfigure_replaces_conversation() {
    let backend = Arc::new(ScriptedBackend::new());
    let room = room(&backend, RoomConfig::default());
    room.configure(&alice_and_bob(), "first").await.unwrap();
    room.take_turn(1).await.unwrap();
    room.take_turn(0).await.unwrap();

    room.configure(&group_of_three(), "second").await.unwrap();

    assert_eq!(room.agents().await.len(), 3);
    assert_eq!(room.turns_taken().await, 0);
    let transcript = room.transcript().await;
    assert_eq!(transcript.len(), 1);
    assert_eq!(transcript[0].content, "second");
}

#[tokio::test]
async fn test_configure_rejects_empty_agent_list() {
    let backend = Arc::new(ScriptedBackend::new());
    let room = room(&backend, RoomConfig::default());

    let err = room.configure(&[], "hello").await.unwrap_err();
    assert!(matches!(err, ChatRoomError::EmptyRegistry));
    assert!(!room.is_configured().await);
    assert!(backend.assistants().is_empty());
}

#[tokio::test]
async fn test_configure_rejects_out_of_range_seed_author() {
    let backend = Arc::new(ScriptedBackend::new());
    let config = RoomConfig::default().with_seed_attribution(SeedAttribution::Agent(2));
    let room = room(&backend, config);

    let err = room.configure(&alice_and_bob(), "hello").await.unwrap_err();
    assert!(matches!(
        err,
        ChatRoomError::InvalidSeedAuthor { index: 2, count: 2 }
    ));
    assert!(backend.assistants().is_empty());
    assert!(!room.is_configured().await);
}

#[tokio::test]
async fn test_turn_before_configure_fails() {
    let backend = Arc::new(ScriptedBackend::new());
    let room = room(&backend, RoomConfig::default());

    assert!(matches!(
        room.take_turn(0).await,
        Err(ChatRoomError::NotConfigured)
    ));
    assert!(matches!(
        room.next_in_rotation().await,
        Err(ChatRoomError::NotConfigured)
    ));
    assert!(matches!(
        room.continue_conversation().await,
        Err(ChatRoomError::NotConfigured)
    ));
    assert_eq!(backend.run_count(), 0);
}

#[tokio::test]
async fn test_two_party_rotation_alternates_speakers() {
    let backend = Arc::new(ScriptedBackend::new());
    let room = room(&backend, RoomConfig::default());
    room.configure(&alice_and_bob(), "Hi! I'm Alice.").await.unwrap();

    assert_eq!(room.next_in_rotation().await.unwrap(), 1);

    let mut speakers = Vec::new();
    for _ in 0..5 {
        speakers.push(room.continue_conversation().await.unwrap().agent_index);
    }
    assert_eq!(speakers, vec![1, 0, 1, 0, 1]);
    assert_eq!(room.transcript().await.len(), 6);
    assert_eq!(room.next_in_rotation().await.unwrap(), 0);
}

#[tokio::test]
async fn test_group_rotation_after_unattributed_seed() {
    let backend = Arc::new(ScriptedBackend::new());
    let config = RoomConfig::default().with_seed_attribution(SeedAttribution::Unattributed);
    let room = room(&backend, config);
    room.configure(&group_of_three(), "Discuss Rust.").await.unwrap();

    assert_eq!(room.next_in_rotation().await.unwrap(), 0);

    let mut speakers = Vec::new();
    for _ in 0..4 {
        speakers.push(room.continue_conversation().await.unwrap().agent_index);
    }
    assert_eq!(speakers, vec![0, 1, 2, 0]);
}

#[tokio::test]
async fn test_snapshot_resolves_speakers() {
    let backend = Arc::new(ScriptedBackend::new());
    let config = RoomConfig::default()
        .with_seed_attribution(SeedAttribution::Unattributed)
        .with_seed_speaker_name("Host");
    let room = room(&backend, config);
    room.configure(&alice_and_bob(), "Welcome!").await.unwrap();
    room.take_turn(1).await.unwrap();

    let snapshot = room.snapshot().await;
    assert_eq!(snapshot.turns_taken, 1);
    assert_eq!(snapshot.agents.len(), 2);
    assert_eq!(
        snapshot.speaker_of(&snapshot.transcript[0]),
        Speaker {
            name: "Host".to_string(),
            avatar: None,
        }
    );
    assert_eq!(
        snapshot.speaker_of(&snapshot.transcript[1]),
        Speaker {
            name: "Bob".to_string(),
            avatar: Some("👨".to_string()),
        }
    );
}

#[tokio::test]
async fn test_reset_clears_room() {
    let backend = Arc::new(ScriptedBackend::new());
    let room = room(&backend, RoomConfig::default());
    room.configure(&alice_and_bob(), "Hi!").await.unwrap();
    room.take_turn(1).await.unwrap();

    room.reset().await;

    assert!(!room.is_configured().await);
    assert!(room.transcript().await.is_empty());
    assert!(room.agents().await.is_empty());
    assert_eq!(room.turns_taken().await, 0);
    assert!(matches!(
        room.take_turn(0).await,
        Err(ChatRoomError::NotConfigured)
    ));

    room.configure(&alice_and_bob(), "Again").await.unwrap();
    let outcome = room.take_turn(1).await.unwrap();
    assert_eq!(outcome.replayed, 1);
}

#[tokio::test]
async fn test_rooms_are_independent() {
    let backend = Arc::new(ScriptedBackend::new());
    let first = room(&backend, RoomConfig::default());
    let second = room(&backend, RoomConfig::default());
    first.configure(&alice_and_bob(), "one").await.unwrap();
    second.configure(&group_of_three(), "two").await.unwrap();

    first.take_turn(1).await.unwrap();

    assert_eq!(first.transcript().await.len(), 2);
    assert_eq!(second.transcript().await.len(), 1);
    assert_eq!(backend.thread_count(), 5);
}
