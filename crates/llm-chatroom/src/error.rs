//! Error types for chat rooms and their assistant backends.

use rand::Rng;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by a single call into the remote assistant backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend answered with a non-success HTTP status, or the request never completed.
    #[error("Backend request failed{}: {message}", .status_code.map(|c| format!(" ({c})")).unwrap_or_default())]
    Http {
        /// HTTP status code, if a response was received.
        status_code: Option<u16>,
        /// Error message extracted from the response body.
        message: String,
        /// Whether repeating the call may succeed.
        is_retryable: bool,
        /// Server-provided delay before retrying (`Retry-After`).
        retry_after: Option<Duration>,
    },

    /// The backend answered, but the body could not be decoded.
    #[error("Failed to decode backend response: {0}")]
    Decode(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// No API credential was supplied.
    #[error("Missing credential: {0}")]
    MissingCredential(String),

    /// A generic error for other cases.
    #[error("Backend error: {0}")]
    Other(String),
}

impl BackendError {
    /// Creates a retryable HTTP error carrying a server-provided retry delay.
    pub fn http_with_retry_after(
        status_code: u16,
        message: impl Into<String>,
        is_retryable: bool,
        retry_after: Duration,
    ) -> Self {
        Self::Http {
            status_code: Some(status_code),
            message: message.into(),
            is_retryable,
            retry_after: Some(retry_after),
        }
    }

    /// Check if this error should trigger an automatic retry.
    ///
    /// Only HTTP failures the backend flagged as retryable qualify. A backend
    /// flags a request that changes remote state only when the server cannot
    /// have applied it (connect failure, 429). Decode and credential errors
    /// fail fast.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BackendError::Http {
                is_retryable: true,
                ..
            }
        )
    }

    /// Delay to wait before retry number `attempt` (1-based).
    ///
    /// Honors `Retry-After` when present; otherwise exponential backoff from
    /// 500ms, capped at 30s, with up to 250ms of jitter.
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        if let BackendError::Http {
            retry_after: Some(delay),
            ..
        } = self
        {
            return *delay;
        }

        let exponent = attempt.saturating_sub(1).min(6);
        let base = Duration::from_millis(500 * (1u64 << exponent)).min(Duration::from_secs(30));
        let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..=250));
        base + jitter
    }
}

/// Errors surfaced to the operator by room configuration and turn execution.
///
/// A run that ends in `failed`, or produces non-text content, is NOT an error
/// here: those outcomes are written into the transcript instead.
#[derive(Debug, Error)]
pub enum ChatRoomError {
    /// Creating the remote assistant or thread for an agent failed.
    /// The room keeps its previous registry.
    #[error("Failed to configure agent '{agent}': {source}")]
    Configuration {
        /// Display name of the agent whose creation failed.
        agent: String,
        /// Underlying backend failure.
        #[source]
        source: BackendError,
    },

    /// A remote call failed in the middle of a turn.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// A turn was requested before any agents were configured.
    #[error("Chat room is not configured")]
    NotConfigured,

    /// A room needs at least one agent.
    #[error("Cannot configure a chat room without agents")]
    EmptyRegistry,

    /// The requested speaker does not exist in the registry.
    #[error("Unknown agent index {index} (room has {count} agents)")]
    UnknownAgent {
        /// Requested agent index.
        index: usize,
        /// Number of configured agents.
        count: usize,
    },

    /// The seed message must be attributed to an existing agent.
    #[error("Seed author index {index} is out of range for {count} agents")]
    InvalidSeedAuthor {
        /// Requested seed author index.
        index: usize,
        /// Number of configured agents.
        count: usize,
    },

    /// The transcript already holds its seed message.
    #[error("Transcript has already been seeded")]
    AlreadySeeded,

    /// The run never reached a terminal state within the configured poll budget.
    ///
    /// The remote run is not cancelled and may block further runs on the
    /// agent's thread until it expires.
    #[error("Run {run_id} did not finish after {attempts} status checks ({elapsed:?})")]
    PollTimeout {
        /// Remote run that stalled.
        run_id: String,
        /// Number of non-terminal status reads observed.
        attempts: u32,
        /// Time spent polling.
        elapsed: Duration,
    },

    /// The operator cancelled the turn while it was in flight.
    #[error("Turn for agent {agent} was cancelled")]
    Cancelled {
        /// Index of the agent whose turn was cancelled.
        agent: usize,
    },

    /// A message template failed to render.
    #[error("Template error: {0}")]
    Template(String),
}

impl From<minijinja::Error> for ChatRoomError {
    fn from(err: minijinja::Error) -> Self {
        ChatRoomError::Template(err.to_string())
    }
}
