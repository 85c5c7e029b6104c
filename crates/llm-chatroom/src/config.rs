//! Configuration for chat room behavior.

use crate::error::ChatRoomError;
use minijinja::{Environment, context};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Model used for assistant profiles when none is configured.
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo-1106";

/// Interval between run status checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Configuration for a chat room.
///
/// # Examples
///
/// ```
/// use llm_chatroom::config::{NamePrefixPolicy, PollConfig, RoomConfig};
/// use std::time::Duration;
///
/// let config = RoomConfig::default()
///     .with_model("gpt-4o-mini")
///     .with_name_prefix(NamePrefixPolicy::Always)
///     .with_poll(PollConfig::default().with_max_attempts(90));
///
/// assert_eq!(config.poll.interval, Duration::from_secs(2));
/// ```
#[derive(Debug, Clone)]
pub struct RoomConfig {
    /// Model for every assistant profile created by `configure`.
    pub model: String,

    /// Tool definitions attached to every assistant profile, passed through untouched.
    pub tools: Vec<serde_json::Value>,

    /// How run status is polled.
    pub poll: PollConfig,

    /// When replayed messages carry their speaker's name.
    pub name_prefix: NamePrefixPolicy,

    /// Who the seed message is attributed to.
    pub seed_attribution: SeedAttribution,

    /// How the pending set of an agent is derived.
    pub replay: ReplayStrategy,

    /// Text templates for replayed lines and failure placeholders.
    pub templates: MessageTemplates,

    /// Display name of an unattributed seed message.
    pub seed_speaker_name: String,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            tools: Vec::new(),
            poll: PollConfig::default(),
            name_prefix: NamePrefixPolicy::default(),
            seed_attribution: SeedAttribution::default(),
            replay: ReplayStrategy::default(),
            templates: MessageTemplates::default(),
            seed_speaker_name: "Moderator".to_string(),
        }
    }
}

impl RoomConfig {
    /// Builds a configuration from defaults overridden by environment variables.
    ///
    /// Environment variables:
    /// - `OPENAI_MODEL` (optional)
    /// - `CHATROOM_POLL_INTERVAL_MS` (optional)
    /// - `CHATROOM_MAX_POLL_ATTEMPTS` (optional, unbounded when unset)
    ///
    /// Unparseable numbers are ignored with a warning.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(model) = env::var("OPENAI_MODEL") {
            if !model.trim().is_empty() {
                config.model = model;
            }
        }
        if let Some(ms) = parse_env_u64("CHATROOM_POLL_INTERVAL_MS") {
            config.poll.interval = Duration::from_millis(ms);
        }
        if let Some(attempts) = parse_env_u64("CHATROOM_MAX_POLL_ATTEMPTS") {
            config.poll.max_attempts = Some(attempts.min(u32::MAX as u64) as u32);
        }

        config
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_tools(mut self, tools: Vec<serde_json::Value>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_poll(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    pub fn with_name_prefix(mut self, policy: NamePrefixPolicy) -> Self {
        self.name_prefix = policy;
        self
    }

    pub fn with_seed_attribution(mut self, attribution: SeedAttribution) -> Self {
        self.seed_attribution = attribution;
        self
    }

    pub fn with_replay(mut self, strategy: ReplayStrategy) -> Self {
        self.replay = strategy;
        self
    }

    pub fn with_templates(mut self, templates: MessageTemplates) -> Self {
        self.templates = templates;
        self
    }

    pub fn with_seed_speaker_name(mut self, name: impl Into<String>) -> Self {
        self.seed_speaker_name = name.into();
        self
    }
}

fn parse_env_u64(key: &str) -> Option<u64> {
    let raw = env::var(key).ok()?;
    match raw.trim().parse::<u64>() {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(
                target = "llm_chatroom::config",
                key,
                value = %raw,
                error = %err,
                event = "config_env_ignored"
            );
            None
        }
    }
}

/// Polling policy for remote runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Delay between two status reads.
    ///
    /// **Default:** 2 seconds
    pub interval: Duration,

    /// Maximum number of non-terminal status reads before giving up with
    /// [`ChatRoomError::PollTimeout`].
    ///
    /// **Default:** `None` (poll until the run completes or fails)
    pub max_attempts: Option<u32>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: None,
        }
    }
}

impl PollConfig {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }
}

/// When a replayed message is prefixed with its speaker's display name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamePrefixPolicy {
    /// Every replayed message is prefixed.
    Always,
    /// Prefix only when the room has more than two agents.
    #[default]
    MultiParty,
    /// Messages are replayed verbatim.
    Never,
}

impl NamePrefixPolicy {
    pub fn applies(&self, agent_count: usize) -> bool {
        match self {
            NamePrefixPolicy::Always => true,
            NamePrefixPolicy::MultiParty => agent_count > 2,
            NamePrefixPolicy::Never => false,
        }
    }
}

/// Attribution of the seed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedAttribution {
    /// The seed counts as spoken by this agent: it is never replayed to that
    /// agent, and rotation starts with the next agent.
    Agent(usize),
    /// The seed has no author and is replayed to every agent.
    Unattributed,
}

impl Default for SeedAttribution {
    fn default() -> Self {
        SeedAttribution::Agent(0)
    }
}

/// How the set of messages an agent has not yet seen is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayStrategy {
    /// Everything after the agent's most recent message in the transcript.
    #[default]
    LastSpoken,
    /// Everything after a per-agent cursor advanced at the end of each of its turns.
    Tracked,
}

/// minijinja templates for text the room generates itself.
///
/// Available variables:
/// - `replay_line`: `name`, `content`
/// - `failure`: `detail`
/// - `unsupported_part`: `kind`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageTemplates {
    pub replay_line: String,
    pub failure: String,
    pub unsupported_part: String,
}

impl Default for MessageTemplates {
    fn default() -> Self {
        Self {
            replay_line: "{{ name }}: {{ content }}".to_string(),
            failure: "Error: {{ detail }}".to_string(),
            unsupported_part: "[unsupported content: {{ kind }}]".to_string(),
        }
    }
}

impl MessageTemplates {
    /// Formats a replayed message with its speaker's name.
    pub fn render_replay_line(&self, name: &str, content: &str) -> Result<String, ChatRoomError> {
        Ok(environment().render_str(&self.replay_line, context! { name, content })?)
    }

    /// Formats the transcript text of a failed run.
    pub fn render_failure(&self, detail: &str) -> Result<String, ChatRoomError> {
        Ok(environment().render_str(&self.failure, context! { detail })?)
    }

    /// Formats the placeholder standing in for a non-text content part.
    pub fn render_unsupported_part(&self, kind: &str) -> Result<String, ChatRoomError> {
        Ok(environment().render_str(&self.unsupported_part, context! { kind })?)
    }
}

/// Message text is not HTML; autoescaping stays off.
fn environment() -> Environment<'static> {
    let mut env = Environment::new();
    env.set_auto_escape_callback(|_| minijinja::AutoEscape::None);
    env
}
