//! Registered agents.

use std::{fmt, hash::Hash};

use serde::{Deserialize, Serialize};

/// What a registered agent does in the league.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    /// Plays matches.
    #[default]
    Player,
    /// Can run matches on behalf of the league.
    Referee,
}

/// A registered agent, keyed by its display name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRecord {
    #[allow(missing_docs)]
    pub display_name: String,
    #[allow(missing_docs)]
    pub version: String,
    /// Full URL of the agent's JSON-RPC endpoint.
    #[serde(rename = "endpoint")]
    pub endpoint_url: String,
    #[allow(missing_docs)]
    #[serde(rename = "agent_type", default)]
    pub role: AgentRole,
}

impl PartialEq for AgentRecord {
    fn eq(&self, other: &Self) -> bool {
        self.display_name == other.display_name
    }
}

impl Eq for AgentRecord {}

impl Hash for AgentRecord {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.display_name.hash(state);
    }
}

impl AgentRecord {
    /// A player record.
    pub fn new(
        display_name: impl Into<String>,
        version: impl Into<String>,
        endpoint_url: impl Into<String>,
    ) -> AgentRecord {
        AgentRecord {
            display_name: display_name.into(),
            version: version.into(),
            endpoint_url: endpoint_url.into(),
            role: AgentRole::Player,
        }
    }

    /// A referee record.
    pub fn referee(
        display_name: impl Into<String>,
        version: impl Into<String>,
        endpoint_url: impl Into<String>,
    ) -> AgentRecord {
        Self::new(display_name, version, endpoint_url).with_role(AgentRole::Referee)
    }

    #[allow(missing_docs)]
    pub fn with_role(mut self, role: AgentRole) -> Self {
        self.role = role;
        self
    }

    #[allow(missing_docs)]
    pub fn is_player(&self) -> bool {
        self.role == AgentRole::Player
    }

    /// Identifier handed back on registration.
    pub fn agent_id(&self) -> String {
        format!("agent_{}", self.display_name)
    }
}

impl fmt::Display for AgentRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.display_name, self.endpoint_url)
    }
}
