//! Agents and their derived workflow activity

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Whether an agent is top-level or bound to parent agents
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum AgentType {
    #[default]
    Agent,
    Subagent,
}

/// A member of the agent team
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, JsonSchema)]
#[ts(export)]
pub struct Agent {
    pub id: Uuid,

    /// Unique display name
    pub name: String,

    /// Free-form job title (e.g., "Content Writer")
    pub role: String,

    /// Role key matched against workflow steps. Agents without one are not
    /// part of workflow routing.
    #[serde(default)]
    pub agent_role: Option<String>,

    #[serde(default)]
    pub agent_type: AgentType,

    /// Parents of a subagent
    #[serde(default)]
    pub parent_agent_ids: Vec<Uuid>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Agent fields supplied by callers when creating or updating an agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, JsonSchema)]
#[ts(export)]
pub struct AgentProfile {
    pub name: String,
    pub role: String,
    #[serde(default)]
    pub agent_role: Option<String>,
    #[serde(default)]
    pub agent_type: AgentType,
    #[serde(default)]
    pub parent_agent_ids: Vec<Uuid>,
}

/// Per-agent activity derived from live workflow steps
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Activity {
    /// A matching step is `agent_working`
    Working,
    /// A matching step is `awaiting_review`
    Waiting,
    #[default]
    Idle,
}

impl Activity {
    pub fn as_str(self) -> &'static str {
        match self {
            Activity::Working => "working",
            Activity::Waiting => "waiting",
            Activity::Idle => "idle",
        }
    }
}

impl std::fmt::Display for Activity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
