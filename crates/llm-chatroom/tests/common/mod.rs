//! Scripted in-memory assistant backend shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use llm_chatroom::backend::{
    AssistantBackend, AssistantId, AssistantSpec, ContentPart, MessageRole, RunId, RunSnapshot,
    RunStatus, ThreadId, ThreadMessage,
};
use llm_chatroom::{AgentConfig, BackendError};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// How a scripted run ends.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    Reply(Vec<ContentPart>),
    Fail(String),
    /// Never leaves `in_progress`.
    Stall,
}

/// One scripted run: `pending_polls` non-terminal reads, then `outcome`.
#[derive(Debug, Clone)]
pub struct RunScript {
    pub pending_polls: u32,
    pub outcome: RunOutcome,
}

impl RunScript {
    pub fn reply(text: &str) -> Self {
        Self {
            pending_polls: 0,
            outcome: RunOutcome::Reply(vec![ContentPart::text(text)]),
        }
    }

    pub fn parts(parts: Vec<ContentPart>) -> Self {
        Self {
            pending_polls: 0,
            outcome: RunOutcome::Reply(parts),
        }
    }

    pub fn fail(detail: &str) -> Self {
        Self {
            pending_polls: 0,
            outcome: RunOutcome::Fail(detail.to_string()),
        }
    }

    pub fn stall() -> Self {
        Self {
            pending_polls: 0,
            outcome: RunOutcome::Stall,
        }
    }

    pub fn after_polls(mut self, pending_polls: u32) -> Self {
        self.pending_polls = pending_polls;
        self
    }
}

struct RunState {
    thread: ThreadId,
    script: RunScript,
    polls: u32,
    finished: bool,
}

#[derive(Default)]
struct State {
    next_id: usize,
    assistants: Vec<AssistantSpec>,
    threads: HashMap<ThreadId, Vec<ThreadMessage>>,
    runs: HashMap<RunId, RunState>,
    scripts: VecDeque<RunScript>,
    create_assistant_calls: usize,
    fail_create_assistant_call: Option<usize>,
    fail_create_run: bool,
    status_reads: u32,
    active_runs: usize,
    max_active_runs: usize,
}

impl State {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}_{}", self.next_id)
    }
}

/// In-memory backend whose runs follow a queue of [`RunScript`]s.
///
/// Runs created with an empty queue reply `"reply from <run id>"` immediately.
#[derive(Default)]
pub struct ScriptedBackend {
    state: Mutex<State>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scripts(scripts: Vec<RunScript>) -> Self {
        let backend = Self::new();
        backend.state.lock().unwrap().scripts = scripts.into();
        backend
    }

    pub fn push_script(&self, script: RunScript) {
        self.state.lock().unwrap().scripts.push_back(script);
    }

    /// Makes the n-th (1-based) `create_assistant` call fail.
    pub fn fail_create_assistant_call(&self, call: usize) {
        self.state.lock().unwrap().fail_create_assistant_call = Some(call);
    }

    pub fn fail_create_run(&self, fail: bool) {
        self.state.lock().unwrap().fail_create_run = fail;
    }

    pub fn assistants(&self) -> Vec<AssistantSpec> {
        self.state.lock().unwrap().assistants.clone()
    }

    pub fn thread_count(&self) -> usize {
        self.state.lock().unwrap().threads.len()
    }

    pub fn run_count(&self) -> usize {
        self.state.lock().unwrap().runs.len()
    }

    pub fn status_reads(&self) -> u32 {
        self.state.lock().unwrap().status_reads
    }

    /// Runs created but not yet observed in a terminal status.
    pub fn active_runs(&self) -> usize {
        self.state.lock().unwrap().active_runs
    }

    pub fn max_active_runs(&self) -> usize {
        self.state.lock().unwrap().max_active_runs
    }

    /// Contents the room appended to `thread` as user messages, in order.
    pub fn user_messages(&self, thread: &ThreadId) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .threads
            .get(thread)
            .map(|messages| {
                messages
                    .iter()
                    .filter(|m| m.role == MessageRole::User)
                    .filter_map(|m| m.content.first().and_then(|p| p.as_text()))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl AssistantBackend for ScriptedBackend {
    async fn create_assistant(&self, spec: &AssistantSpec) -> Result<AssistantId, BackendError> {
        let mut state = self.state.lock().unwrap();
        state.create_assistant_calls += 1;
        if state.fail_create_assistant_call == Some(state.create_assistant_calls) {
            return Err(BackendError::Http {
                status_code: Some(400),
                message: format!("cannot create {}", spec.name),
                is_retryable: false,
                retry_after: None,
            });
        }
        state.assistants.push(spec.clone());
        Ok(AssistantId::new(state.next_id("asst")))
    }

    async fn create_thread(&self) -> Result<ThreadId, BackendError> {
        let mut state = self.state.lock().unwrap();
        let id = ThreadId::new(state.next_id("thread"));
        state.threads.insert(id.clone(), Vec::new());
        Ok(id)
    }

    async fn append_message(
        &self,
        thread: &ThreadId,
        role: MessageRole,
        content: &str,
    ) -> Result<(), BackendError> {
        let mut state = self.state.lock().unwrap();
        let messages = state
            .threads
            .get_mut(thread)
            .ok_or_else(|| BackendError::Other(format!("no such thread {thread}")))?;
        messages.push(ThreadMessage {
            run_id: None,
            role,
            content: vec![ContentPart::text(content)],
        });
        Ok(())
    }

    async fn create_run(
        &self,
        thread: &ThreadId,
        _assistant: &AssistantId,
    ) -> Result<RunId, BackendError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_create_run {
            return Err(BackendError::Http {
                status_code: Some(500),
                message: "run creation failed".to_string(),
                is_retryable: false,
                retry_after: None,
            });
        }
        let id = RunId::new(state.next_id("run"));
        let script = state
            .scripts
            .pop_front()
            .unwrap_or_else(|| RunScript::reply(&format!("reply from {id}")));
        state.runs.insert(
            id.clone(),
            RunState {
                thread: thread.clone(),
                script,
                polls: 0,
                finished: false,
            },
        );
        state.active_runs += 1;
        state.max_active_runs = state.max_active_runs.max(state.active_runs);
        Ok(id)
    }

    async fn run_status(
        &self,
        _thread: &ThreadId,
        run: &RunId,
    ) -> Result<RunSnapshot, BackendError> {
        let mut state = self.state.lock().unwrap();
        state.status_reads += 1;

        let run_state = state
            .runs
            .get_mut(run)
            .ok_or_else(|| BackendError::Other(format!("no such run {run}")))?;

        if run_state.polls < run_state.script.pending_polls {
            run_state.polls += 1;
            return Ok(RunSnapshot::new(RunStatus::InProgress));
        }

        let (snapshot, output) = match &run_state.script.outcome {
            RunOutcome::Stall => return Ok(RunSnapshot::new(RunStatus::InProgress)),
            RunOutcome::Fail(detail) => (RunSnapshot::failed(detail.clone()), None),
            RunOutcome::Reply(parts) => (RunSnapshot::new(RunStatus::Completed), Some(parts.clone())),
        };

        let newly_finished = !run_state.finished;
        run_state.finished = true;
        let thread = run_state.thread.clone();

        if newly_finished {
            state.active_runs -= 1;
            if let Some(parts) = output {
                if let Some(messages) = state.threads.get_mut(&thread) {
                    messages.push(ThreadMessage {
                        run_id: Some(run.clone()),
                        role: MessageRole::Assistant,
                        content: parts,
                    });
                }
            }
        }
        Ok(snapshot)
    }

    async fn list_messages(&self, thread: &ThreadId) -> Result<Vec<ThreadMessage>, BackendError> {
        let state = self.state.lock().unwrap();
        Ok(state.threads.get(thread).cloned().unwrap_or_default())
    }
}

pub fn alice_and_bob() -> Vec<AgentConfig> {
    vec![
        AgentConfig::new("Alice", "👩", "You are Alice. You are talking with Bob."),
        AgentConfig::new("Bob", "👨", "You are Bob. You are talking with Alice."),
    ]
}

pub fn group_of_three() -> Vec<AgentConfig> {
    vec![
        AgentConfig::new("Alice", "👩", "You are Alice. You are in a chat room."),
        AgentConfig::new("Bob", "👨", "You are Bob. You are in a chat room."),
        AgentConfig::new("Carol", "🧑", "You are Carol. You are in a chat room."),
    ]
}
