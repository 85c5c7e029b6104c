//! Contract with the hosted assistant service.
//!
//! A chat room never talks HTTP directly. Everything it needs from the remote
//! side (assistant profiles, private threads, runs and their output) goes
//! through [`AssistantBackend`], which keeps the turn logic testable against an
//! in-memory implementation.

#[cfg(feature = "openai-api")]
pub mod openai;

pub mod retry;

#[cfg(feature = "openai-api")]
pub use openai::OpenAIAssistantsBackend;

use crate::error::BackendError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! remote_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wraps a backend-issued identifier.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as issued by the backend.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

remote_handle!(
    /// Opaque handle of a remote assistant profile.
    AssistantId
);
remote_handle!(
    /// Opaque handle of a remote conversation thread.
    ThreadId
);
remote_handle!(
    /// Opaque handle of a remote generation run.
    RunId
);

/// Everything needed to create a remote assistant profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantSpec {
    pub name: String,
    pub instructions: String,
    /// Tool definitions, passed through to the backend untouched.
    #[serde(default)]
    pub tools: Vec<serde_json::Value>,
    pub model: String,
}

/// Role of a message appended to a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

/// Lifecycle state of a remote run.
///
/// Only [`RunStatus::Completed`] and [`RunStatus::Failed`] end a turn's polling;
/// every other value (including ones this crate does not know about) keeps polling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Cancelling,
    Cancelled,
    Expired,
    Incomplete,
    Completed,
    Failed,
    #[serde(other)]
    Unknown,
}

impl RunStatus {
    /// Whether polling should stop at this status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

/// A status read of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSnapshot {
    pub status: RunStatus,
    /// Error detail reported by the backend for a failed run.
    pub last_error: Option<String>,
}

impl RunSnapshot {
    pub fn new(status: RunStatus) -> Self {
        Self {
            status,
            last_error: None,
        }
    }

    pub fn failed(detail: impl Into<String>) -> Self {
        Self {
            status: RunStatus::Failed,
            last_error: Some(detail.into()),
        }
    }
}

/// One content part of a thread message.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentPart {
    Text(String),
    /// Any non-text part (image file, image URL, refusal, ...).
    Other {
        /// Backend-reported part type, e.g. `image_file`.
        kind: String,
        raw: serde_json::Value,
    },
}

impl ContentPart {
    pub fn text(value: impl Into<String>) -> Self {
        ContentPart::Text(value.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentPart::Text(text) => Some(text),
            ContentPart::Other { .. } => None,
        }
    }
}

/// A message as listed from a thread.
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadMessage {
    /// Run that produced this message; `None` for messages appended by the room.
    pub run_id: Option<RunId>,
    pub role: MessageRole,
    pub content: Vec<ContentPart>,
}

/// The remote conversational-assistant service.
///
/// Implementations must be safe to share between rooms; each room only ever
/// touches the threads owned by its own agents.
#[async_trait]
pub trait AssistantBackend: Send + Sync {
    /// Creates an assistant profile and returns its handle.
    async fn create_assistant(&self, spec: &AssistantSpec) -> Result<AssistantId, BackendError>;

    /// Creates an empty conversation thread.
    async fn create_thread(&self) -> Result<ThreadId, BackendError>;

    /// Appends one message to a thread.
    async fn append_message(
        &self,
        thread: &ThreadId,
        role: MessageRole,
        content: &str,
    ) -> Result<(), BackendError>;

    /// Starts a generation run of `assistant` on `thread`.
    async fn create_run(
        &self,
        thread: &ThreadId,
        assistant: &AssistantId,
    ) -> Result<RunId, BackendError>;

    /// Reads the current status of a run.
    async fn run_status(&self, thread: &ThreadId, run: &RunId)
    -> Result<RunSnapshot, BackendError>;

    /// Lists all messages of a thread, oldest first.
    async fn list_messages(&self, thread: &ThreadId) -> Result<Vec<ThreadMessage>, BackendError>;
}
