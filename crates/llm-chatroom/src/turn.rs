//! Execution of a single conversational turn.
//!
//! A turn moves through `Idle -> Replaying -> Generating -> Polling -> Appended`:
//! the speaker's pending messages are appended to its private thread, a run is
//! started, its status is polled until `completed` or `failed`, and the
//! resulting text is appended to the transcript under the speaker's index.
//!
//! A failed run is not an error: its detail is rendered into the transcript so
//! the room shows what happened and stays usable. Errors are reserved for
//! remote-call failures, poll timeouts and cancellation, none of which touch
//! the transcript.

use crate::backend::{
    AssistantBackend, ContentPart, MessageRole, RunId, RunSnapshot, RunStatus, ThreadId,
    ThreadMessage,
};
use crate::config::{MessageTemplates, PollConfig, RoomConfig};
use crate::error::ChatRoomError;
use crate::registry::{Agent, AgentRegistry};
use crate::replay::{ReplayResolver, render_replay};
use crate::transcript::{Author, RoomMessage, TranscriptStore};
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Progress of the turn currently executing in a room.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TurnPhase {
    #[default]
    Idle,
    Replaying {
        agent_index: usize,
        pending: usize,
    },
    Generating {
        agent_index: usize,
    },
    Polling {
        agent_index: usize,
        run_id: RunId,
        attempts: u32,
    },
    Appended {
        agent_index: usize,
        position: usize,
    },
}

/// How the remote run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationStatus {
    Completed {
        /// Number of non-text parts replaced by a placeholder.
        unsupported_parts: usize,
    },
    Failed {
        detail: String,
    },
}

/// Result of a turn that reached the transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    pub agent_index: usize,
    /// Transcript position of the appended message.
    pub position: usize,
    pub message: RoomMessage,
    /// Number of transcript messages replayed into the speaker's thread.
    pub replayed: usize,
    pub run_id: RunId,
    pub status: GenerationStatus,
}

impl TurnOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self.status, GenerationStatus::Failed { .. })
    }
}

/// Result of one status read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollState {
    Pending(RunStatus),
    Finished(RunSnapshot),
}

/// Polls one run until it reaches a terminal status.
///
/// [`RunPoller::poll_once`] is a single suspension point; [`RunPoller::wait`]
/// drives it on the configured interval.
pub struct RunPoller<'a> {
    backend: &'a dyn AssistantBackend,
    thread: &'a ThreadId,
    run: &'a RunId,
    config: PollConfig,
    attempts: u32,
    started: Instant,
}

impl<'a> RunPoller<'a> {
    pub fn new(
        backend: &'a dyn AssistantBackend,
        thread: &'a ThreadId,
        run: &'a RunId,
        config: PollConfig,
    ) -> Self {
        Self {
            backend,
            thread,
            run,
            config,
            attempts: 0,
            started: Instant::now(),
        }
    }

    /// Number of non-terminal status reads so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Reads the run status once.
    ///
    /// Fails with [`ChatRoomError::PollTimeout`] when this read exhausts the
    /// configured attempt budget without reaching a terminal status.
    pub async fn poll_once(&mut self) -> Result<PollState, ChatRoomError> {
        let snapshot = self.backend.run_status(self.thread, self.run).await?;
        if snapshot.status.is_terminal() {
            return Ok(PollState::Finished(snapshot));
        }

        self.attempts += 1;
        if let Some(max_attempts) = self.config.max_attempts {
            if self.attempts >= max_attempts {
                return Err(ChatRoomError::PollTimeout {
                    run_id: self.run.to_string(),
                    attempts: self.attempts,
                    elapsed: self.started.elapsed(),
                });
            }
        }
        Ok(PollState::Pending(snapshot.status))
    }

    /// Polls until the run completes or fails, sleeping between reads.
    pub async fn wait(
        mut self,
        agent_index: usize,
        cancel: &CancellationToken,
        phase: Option<&watch::Sender<TurnPhase>>,
    ) -> Result<RunSnapshot, ChatRoomError> {
        loop {
            match self.poll_once().await? {
                PollState::Finished(snapshot) => return Ok(snapshot),
                PollState::Pending(status) => {
                    debug!(
                        target = "llm_chatroom::turn",
                        agent_index,
                        run_id = %self.run,
                        status = ?status,
                        attempts = self.attempts,
                        event = "run_poll_pending"
                    );
                    report(
                        phase,
                        TurnPhase::Polling {
                            agent_index,
                            run_id: self.run.clone(),
                            attempts: self.attempts,
                        },
                    );
                }
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    warn!(
                        target = "llm_chatroom::turn",
                        agent_index,
                        run_id = %self.run,
                        event = "turn_cancelled"
                    );
                    return Err(ChatRoomError::Cancelled { agent: agent_index });
                }
                _ = tokio::time::sleep(self.config.interval) => {}
            }
        }
    }
}

/// Text produced by a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub text: String,
    pub unsupported_parts: usize,
}

/// Joins the content of every message produced by `run`, oldest first.
///
/// Text parts are separated by newlines. Non-text parts are replaced by the
/// `unsupported_part` template rather than dropped.
pub fn extract_answer(
    messages: &[ThreadMessage],
    run: &RunId,
    templates: &MessageTemplates,
) -> Result<Answer, ChatRoomError> {
    let mut unsupported_parts = 0;
    let mut pieces = Vec::new();

    for part in messages
        .iter()
        .filter(|message| message.run_id.as_ref() == Some(run))
        .flat_map(|message| message.content.iter())
    {
        match part {
            ContentPart::Text(text) => pieces.push(text.clone()),
            ContentPart::Other { kind, .. } => {
                unsupported_parts += 1;
                pieces.push(templates.render_unsupported_part(kind)?);
            }
        }
    }

    Ok(Answer {
        text: pieces.join("\n"),
        unsupported_parts,
    })
}

/// Runs turns against a backend with a fixed room configuration.
pub struct TurnExecutor<'a> {
    backend: &'a dyn AssistantBackend,
    config: &'a RoomConfig,
    phase: Option<&'a watch::Sender<TurnPhase>>,
}

impl<'a> TurnExecutor<'a> {
    pub fn new(backend: &'a dyn AssistantBackend, config: &'a RoomConfig) -> Self {
        Self {
            backend,
            config,
            phase: None,
        }
    }

    /// Publishes phase transitions to `sender`.
    pub fn with_phase_reporter(mut self, sender: &'a watch::Sender<TurnPhase>) -> Self {
        self.phase = Some(sender);
        self
    }

    /// Lets `agent_index` speak once and appends its reply to `transcript`.
    ///
    /// The transcript and replay cursors are only modified after the run has
    /// reached a terminal status and its output has been read.
    pub async fn take_turn(
        &self,
        registry: &AgentRegistry,
        transcript: &mut TranscriptStore,
        replay: &mut ReplayResolver,
        agent_index: usize,
        cancel: &CancellationToken,
    ) -> Result<TurnOutcome, ChatRoomError> {
        let agent = registry.require(agent_index)?;
        let result = self
            .run_turn(registry, agent, transcript, replay, cancel)
            .await;

        match &result {
            Ok(outcome) => info!(
                target = "llm_chatroom::turn",
                agent = %agent.name,
                agent_index,
                position = outcome.position,
                replayed = outcome.replayed,
                failed = outcome.is_failure(),
                event = "turn_appended"
            ),
            Err(err) => error!(
                target = "llm_chatroom::turn",
                agent = %agent.name,
                agent_index,
                error = %err,
                event = "turn_failed"
            ),
        }
        report(self.phase, TurnPhase::Idle);
        result
    }

    async fn run_turn(
        &self,
        registry: &AgentRegistry,
        agent: &Agent,
        transcript: &mut TranscriptStore,
        replay: &mut ReplayResolver,
        cancel: &CancellationToken,
    ) -> Result<TurnOutcome, ChatRoomError> {
        let agent_index = agent.index;

        let pending = replay.pending(agent_index, transcript.all());
        let lines = render_replay(
            pending,
            registry,
            self.config.name_prefix,
            &self.config.templates,
            &self.config.seed_speaker_name,
        )?;
        report(
            self.phase,
            TurnPhase::Replaying {
                agent_index,
                pending: lines.len(),
            },
        );
        debug!(
            target = "llm_chatroom::turn",
            agent_index,
            pending = lines.len(),
            transcript_len = transcript.len(),
            event = "turn_replaying"
        );

        for line in &lines {
            ensure_not_cancelled(cancel, agent_index)?;
            self.backend
                .append_message(&agent.thread_id, MessageRole::User, line)
                .await?;
        }

        ensure_not_cancelled(cancel, agent_index)?;
        report(self.phase, TurnPhase::Generating { agent_index });
        let run_id = self
            .backend
            .create_run(&agent.thread_id, &agent.assistant_id)
            .await?;
        debug!(
            target = "llm_chatroom::turn",
            agent_index,
            run_id = %run_id,
            event = "run_created"
        );

        report(
            self.phase,
            TurnPhase::Polling {
                agent_index,
                run_id: run_id.clone(),
                attempts: 0,
            },
        );
        let snapshot = RunPoller::new(self.backend, &agent.thread_id, &run_id, self.config.poll)
            .wait(agent_index, cancel, self.phase)
            .await?;

        let (content, status) = match snapshot.status {
            RunStatus::Completed => {
                let messages = self.backend.list_messages(&agent.thread_id).await?;
                let answer = extract_answer(&messages, &run_id, &self.config.templates)?;
                if answer.unsupported_parts > 0 {
                    warn!(
                        target = "llm_chatroom::turn",
                        agent_index,
                        run_id = %run_id,
                        unsupported_parts = answer.unsupported_parts,
                        event = "unsupported_content_replaced"
                    );
                }
                (
                    answer.text,
                    GenerationStatus::Completed {
                        unsupported_parts: answer.unsupported_parts,
                    },
                )
            }
            _ => {
                let detail = snapshot
                    .last_error
                    .unwrap_or_else(|| "unknown error".to_string());
                warn!(
                    target = "llm_chatroom::turn",
                    agent_index,
                    run_id = %run_id,
                    detail = %detail,
                    event = "run_failed"
                );
                (
                    self.config.templates.render_failure(&detail)?,
                    GenerationStatus::Failed { detail },
                )
            }
        };

        let position = transcript.append(Author::Agent(agent_index), content);
        replay.record_turn(agent_index, transcript.len());
        report(
            self.phase,
            TurnPhase::Appended {
                agent_index,
                position,
            },
        );

        Ok(TurnOutcome {
            agent_index,
            position,
            message: transcript.all()[position].clone(),
            replayed: lines.len(),
            run_id,
            status,
        })
    }
}

fn ensure_not_cancelled(cancel: &CancellationToken, agent_index: usize) -> Result<(), ChatRoomError> {
    if cancel.is_cancelled() {
        return Err(ChatRoomError::Cancelled { agent: agent_index });
    }
    Ok(())
}

fn report(phase: Option<&watch::Sender<TurnPhase>>, next: TurnPhase) {
    if let Some(sender) = phase {
        sender.send_replace(next);
    }
}
