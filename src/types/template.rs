//! Workflow templates - reusable ordered step blueprints

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// One step of a workflow template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, JsonSchema)]
#[ts(export)]
pub struct StepSpec {
    /// 1-based position within the template
    pub order: u32,

    /// Short display name (e.g., "Research", "Draft")
    pub name: String,

    /// Role key of the agent that executes this step. `None` leaves the step
    /// unassigned until an agent claims it.
    #[serde(default)]
    pub agent_role: Option<String>,

    #[serde(default)]
    pub description: Option<String>,
}

/// Template definition as authored in files or API requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, JsonSchema)]
#[ts(export)]
pub struct TemplateDefinition {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub steps: Vec<StepSpec>,
}

/// Immutable workflow template shared by many instances
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, JsonSchema)]
#[ts(export)]
pub struct WorkflowTemplate {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Steps sorted by `order`, contiguous from 1
    pub steps: Vec<StepSpec>,
    pub created_at: DateTime<Utc>,
}

impl WorkflowTemplate {
    /// Number of steps an instance of this template runs through
    pub fn total_steps(&self) -> u32 {
        self.steps.len() as u32
    }

    /// Look up the step spec at a 1-based order
    pub fn step(&self, order: u32) -> Option<&StepSpec> {
        self.steps.iter().find(|s| s.order == order)
    }

    /// Whether any step in this template is routed to `role`
    pub fn uses_role(&self, role: &str) -> bool {
        self.steps
            .iter()
            .any(|s| s.agent_role.as_deref() == Some(role))
    }
}
