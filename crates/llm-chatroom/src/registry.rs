//! The set of agents taking part in a room.
//!
//! Each agent owns exactly one remote assistant profile and one private
//! thread. Agents are addressed by their position in the registry, which never
//! changes for the lifetime of the registry.

use crate::backend::{AssistantBackend, AssistantId, AssistantSpec, ThreadId};
use crate::error::{BackendError, ChatRoomError};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

/// Operator-provided description of one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub name: String,
    pub avatar: String,
    pub instructions: String,
}

impl AgentConfig {
    pub fn new(
        name: impl Into<String>,
        avatar: impl Into<String>,
        instructions: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            avatar: avatar.into(),
            instructions: instructions.into(),
        }
    }
}

/// A configured participant bound to its remote assistant and thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Agent {
    pub index: usize,
    pub name: String,
    pub avatar: String,
    pub instructions: String,
    pub assistant_id: AssistantId,
    pub thread_id: ThreadId,
}

/// Immutable, index-addressed set of agents.
#[derive(Debug, Clone, Default)]
pub struct AgentRegistry {
    agents: Vec<Agent>,
}

impl AgentRegistry {
    /// Creates one assistant profile and one thread per config entry.
    ///
    /// Agents are created concurrently but indexed in config order. The call
    /// is all-or-nothing: if any remote call fails, no registry is returned.
    /// Remote objects created before the failure are not deleted.
    pub async fn configure(
        backend: &dyn AssistantBackend,
        configs: &[AgentConfig],
        model: &str,
        tools: &[serde_json::Value],
    ) -> Result<Self, ChatRoomError> {
        if configs.is_empty() {
            return Err(ChatRoomError::EmptyRegistry);
        }

        let agents = try_join_all(
            configs
                .iter()
                .enumerate()
                .map(|(index, config)| create_agent(backend, index, config, model, tools)),
        )
        .await?;

        info!(
            target = "llm_chatroom::registry",
            agent_count = agents.len(),
            model,
            event = "registry_configured"
        );

        Ok(Self { agents })
    }

    /// Builds a registry from agents whose remote objects already exist.
    ///
    /// Indices are reassigned to match the order of `agents`.
    pub fn from_agents(agents: Vec<Agent>) -> Self {
        let agents = agents
            .into_iter()
            .enumerate()
            .map(|(index, agent)| Agent { index, ..agent })
            .collect();
        Self { agents }
    }

    pub fn get(&self, index: usize) -> Option<&Agent> {
        self.agents.get(index)
    }

    /// Looks up an agent, failing with [`ChatRoomError::UnknownAgent`].
    pub fn require(&self, index: usize) -> Result<&Agent, ChatRoomError> {
        self.agents.get(index).ok_or(ChatRoomError::UnknownAgent {
            index,
            count: self.agents.len(),
        })
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

async fn create_agent(
    backend: &dyn AssistantBackend,
    index: usize,
    config: &AgentConfig,
    model: &str,
    tools: &[serde_json::Value],
) -> Result<Agent, ChatRoomError> {
    let spec = AssistantSpec {
        name: config.name.clone(),
        instructions: config.instructions.clone(),
        tools: tools.to_vec(),
        model: model.to_string(),
    };

    let created = async {
        let assistant_id = backend.create_assistant(&spec).await?;
        let thread_id = backend.create_thread().await?;
        Ok::<_, BackendError>((assistant_id, thread_id))
    }
    .await;

    match created {
        Ok((assistant_id, thread_id)) => Ok(Agent {
            index,
            name: config.name.clone(),
            avatar: config.avatar.clone(),
            instructions: config.instructions.clone(),
            assistant_id,
            thread_id,
        }),
        Err(source) => {
            error!(
                target = "llm_chatroom::registry",
                agent = %config.name,
                agent_index = index,
                error = %source,
                event = "agent_creation_failed"
            );
            Err(ChatRoomError::Configuration {
                agent: config.name.clone(),
                source,
            })
        }
    }
}
