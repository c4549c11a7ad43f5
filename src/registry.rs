//! In-memory registry of the agents known to the league.

use std::{
    collections::HashMap,
    sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    agent::{AgentRecord, AgentRole},
    error::RegistryError,
};

/// Acknowledgment returned to a registering agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterAck {
    /// Always `"registered"`.
    pub status: String,
    /// `agent_<display_name>`.
    pub agent_id: String,
    #[allow(missing_docs)]
    pub message: String,
}

#[derive(Debug, Default)]
struct Inner {
    agents: HashMap<String, AgentRecord>,
    referee: Option<String>,
}

/// Agents keyed by display name. Registration is an upsert.
#[derive(Debug, Default)]
pub struct AgentRegistry {
    inner: RwLock<Inner>,
}

impl AgentRegistry {
    #[allow(missing_docs)]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or overwrite `record`.
    pub fn register(&self, record: AgentRecord) -> RegisterAck {
        let ack = RegisterAck {
            status: "registered".to_string(),
            agent_id: record.agent_id(),
            message: format!("Agent {} registered successfully", record.display_name),
        };

        let mut inner = self.write();
        match record.role {
            AgentRole::Referee => inner.referee = Some(record.display_name.clone()),
            AgentRole::Player => {
                if inner.referee.as_deref() == Some(record.display_name.as_str()) {
                    inner.referee = None;
                }
            }
        }
        let previous = inner.agents.insert(record.display_name.clone(), record);
        let total = inner.agents.len();
        drop(inner);

        if previous.is_some() {
            info!(agent_id = %ack.agent_id, total, "agent re-registered");
        } else {
            info!(agent_id = %ack.agent_id, total, "agent registered");
        }
        ack
    }

    /// Snapshot of every agent, ordered by name.
    pub fn list(&self) -> Vec<AgentRecord> {
        let mut agents = self.read().agents.values().cloned().collect::<Vec<_>>();
        agents.sort_by(|a, b| a.display_name.cmp(&b.display_name));
        agents
    }

    /// Look an agent up by display name.
    pub fn get(&self, name: &str) -> Result<AgentRecord, RegistryError> {
        self.read()
            .agents
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    /// Snapshot of the players, ordered by name.
    pub fn players(&self) -> Vec<AgentRecord> {
        let mut players = self.list();
        players.retain(AgentRecord::is_player);
        players
    }

    /// The most recently registered referee, if any.
    pub fn referee(&self) -> Option<AgentRecord> {
        let inner = self.read();
        inner
            .referee
            .as_ref()
            .and_then(|name| inner.agents.get(name))
            .cloned()
    }

    /// Number of registered agents, all roles included.
    pub fn len(&self) -> usize {
        self.read().agents.len()
    }

    #[allow(missing_docs)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[allow(missing_docs)]
    pub fn player_count(&self) -> usize {
        self.read().agents.values().filter(|a| a.is_player()).count()
    }
}
