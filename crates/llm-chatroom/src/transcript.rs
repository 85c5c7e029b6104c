//! The shared, append-only transcript of a room.

use crate::error::ChatRoomError;
use serde::{Deserialize, Serialize};

/// Who a transcript message is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "index", rename_all = "snake_case")]
pub enum Author {
    /// The agent at this registry index.
    Agent(usize),
    /// The operator's seed message, not spoken by any agent.
    Seed,
}

impl Author {
    /// Registry index of the authoring agent, if any.
    pub fn agent_index(&self) -> Option<usize> {
        match self {
            Author::Agent(index) => Some(*index),
            Author::Seed => None,
        }
    }

    pub fn is_agent(&self, index: usize) -> bool {
        self.agent_index() == Some(index)
    }
}

/// One message of the room transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomMessage {
    pub author: Author,
    pub content: String,
}

impl RoomMessage {
    pub fn new(author: Author, content: impl Into<String>) -> Self {
        Self {
            author,
            content: content.into(),
        }
    }
}

/// Append-only sequence of room messages.
///
/// Position in the sequence is the conversational order. Messages are never
/// edited or removed; a new conversation needs a new store.
#[derive(Debug, Clone, Default)]
pub struct TranscriptStore {
    messages: Vec<RoomMessage>,
}

impl TranscriptStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes the opening message. Only valid on an empty store.
    pub fn seed(&mut self, content: impl Into<String>, author: Author) -> Result<(), ChatRoomError> {
        if !self.messages.is_empty() {
            return Err(ChatRoomError::AlreadySeeded);
        }
        self.messages.push(RoomMessage::new(author, content));
        Ok(())
    }

    /// Adds a message at the end and returns its position.
    pub fn append(&mut self, author: Author, content: impl Into<String>) -> usize {
        self.messages.push(RoomMessage::new(author, content));
        self.messages.len() - 1
    }

    /// All messages, oldest first.
    pub fn all(&self) -> &[RoomMessage] {
        &self.messages
    }

    pub fn last(&self) -> Option<&RoomMessage> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
