//! Which transcript messages an agent still has to see.
//!
//! An agent's private thread only ever receives messages through replay, so
//! before it speaks it must be sent everything said since it last caught up.
//! The default rule derives that point from the transcript itself: the
//! agent's most recent message. Everything strictly after it is pending; an
//! agent that has never spoken gets the whole transcript, and an agent whose
//! message is the last one gets nothing.

use crate::config::{MessageTemplates, NamePrefixPolicy, ReplayStrategy};
use crate::error::ChatRoomError;
use crate::registry::AgentRegistry;
use crate::transcript::{Author, RoomMessage};
use std::collections::HashMap;

/// Position of the most recent message authored by `agent_index`.
pub fn last_spoken_position(agent_index: usize, transcript: &[RoomMessage]) -> Option<usize> {
    transcript
        .iter()
        .rposition(|message| message.author.is_agent(agent_index))
}

/// Messages `agent_index` has not yet absorbed, in transcript order.
///
/// Always a contiguous suffix of `transcript`, never including the agent's
/// own last message.
pub fn pending_messages(agent_index: usize, transcript: &[RoomMessage]) -> &[RoomMessage] {
    match last_spoken_position(agent_index, transcript) {
        Some(position) => &transcript[position + 1..],
        None => transcript,
    }
}

/// Resolves pending sets according to a [`ReplayStrategy`].
///
/// With [`ReplayStrategy::Tracked`], each agent's cursor is the transcript
/// length right after its own reply was appended. Agents without a cursor
/// fall back to the last-spoken rule, so a seed attributed to an agent is
/// still never replayed to it.
#[derive(Debug, Clone, Default)]
pub struct ReplayResolver {
    strategy: ReplayStrategy,
    cursors: HashMap<usize, usize>,
}

impl ReplayResolver {
    pub fn new(strategy: ReplayStrategy) -> Self {
        Self {
            strategy,
            cursors: HashMap::new(),
        }
    }

    pub fn pending<'t>(&self, agent_index: usize, transcript: &'t [RoomMessage]) -> &'t [RoomMessage] {
        match (self.strategy, self.cursors.get(&agent_index)) {
            (ReplayStrategy::Tracked, Some(&cursor)) => &transcript[cursor.min(transcript.len())..],
            _ => pending_messages(agent_index, transcript),
        }
    }

    /// Records that `agent_index` is in sync with the first `absorbed` messages.
    pub fn record_turn(&mut self, agent_index: usize, absorbed: usize) {
        if self.strategy == ReplayStrategy::Tracked {
            self.cursors.insert(agent_index, absorbed);
        }
    }

    /// Forgets every cursor; used when the room is reconfigured.
    pub fn reset(&mut self) {
        self.cursors.clear();
    }

    pub fn cursor(&self, agent_index: usize) -> Option<usize> {
        self.cursors.get(&agent_index).copied()
    }
}

/// Turns pending messages into the text appended to the speaker's thread.
pub fn render_replay(
    pending: &[RoomMessage],
    registry: &AgentRegistry,
    policy: NamePrefixPolicy,
    templates: &MessageTemplates,
    seed_speaker_name: &str,
) -> Result<Vec<String>, ChatRoomError> {
    let prefixed = policy.applies(registry.len());

    pending
        .iter()
        .map(|message| {
            if !prefixed {
                return Ok(message.content.clone());
            }
            let name = match message.author {
                Author::Agent(index) => registry
                    .get(index)
                    .map(|agent| agent.name.as_str())
                    .unwrap_or(seed_speaker_name),
                Author::Seed => seed_speaker_name,
            };
            templates.render_replay_line(name, &message.content)
        })
        .collect()
}
