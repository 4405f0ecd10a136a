//! Workflow instances and the steps they own
//!
//! In the mission control model:
//! - A WorkflowTemplate defines an ordered list of StepSpecs
//! - A WorkflowInstance runs one template, holding a 1-based cursor over its steps
//! - Each cursor position has one or more WorkflowSteps (a retry after rejection
//!   is a fresh step at the same order)
//! - Exactly one step per running instance is active, tracked by `active_step_id`

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Instance-level status
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum InstanceStatus {
    /// The current step has not been claimed yet
    Active,
    /// An agent has claimed the current step; stays running through review
    /// until the instance advances
    Running,
    /// Automatic progression halted until a human resumes the instance
    PausedForReview,
    /// Every template step has been approved
    Completed,
    /// Stopped by the owner; live steps were skipped
    Cancelled,
}

impl InstanceStatus {
    pub const ALL: [InstanceStatus; 5] = [
        InstanceStatus::Active,
        InstanceStatus::Running,
        InstanceStatus::PausedForReview,
        InstanceStatus::Completed,
        InstanceStatus::Cancelled,
    ];

    /// Completed and cancelled instances accept no further mutation
    pub fn is_terminal(self) -> bool {
        matches!(self, InstanceStatus::Completed | InstanceStatus::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            InstanceStatus::Active => "active",
            InstanceStatus::Running => "running",
            InstanceStatus::PausedForReview => "paused_for_review",
            InstanceStatus::Completed => "completed",
            InstanceStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstanceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown instance status '{s}'"))
    }
}

/// Flat step status, used for filtering and display
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum StepStatus {
    Pending,
    AgentWorking,
    AwaitingReview,
    Approved,
    Rejected,
    Skipped,
}

impl StepStatus {
    /// Statuses of steps that are not yet terminal
    pub const LIVE: [StepStatus; 3] = [
        StepStatus::Pending,
        StepStatus::AgentWorking,
        StepStatus::AwaitingReview,
    ];

    pub fn is_live(self) -> bool {
        Self::LIVE.contains(&self)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::AgentWorking => "agent_working",
            StepStatus::AwaitingReview => "awaiting_review",
            StepStatus::Approved => "approved",
            StepStatus::Rejected => "rejected",
            StepStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Step lifecycle state, carrying the data each state owns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, JsonSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
#[ts(export)]
pub enum StepState {
    Pending,
    AgentWorking {
        started_at: DateTime<Utc>,
    },
    AwaitingReview {
        started_at: DateTime<Utc>,
        submitted_at: DateTime<Utc>,
        output: Option<String>,
    },
    Approved {
        submitted_at: DateTime<Utc>,
        reviewed_at: DateTime<Utc>,
        output: Option<String>,
        notes: Option<String>,
    },
    Rejected {
        submitted_at: DateTime<Utc>,
        reviewed_at: DateTime<Utc>,
        output: Option<String>,
        reason: String,
    },
    Skipped {
        skipped_at: DateTime<Utc>,
    },
}

impl StepState {
    pub fn status(&self) -> StepStatus {
        match self {
            StepState::Pending => StepStatus::Pending,
            StepState::AgentWorking { .. } => StepStatus::AgentWorking,
            StepState::AwaitingReview { .. } => StepStatus::AwaitingReview,
            StepState::Approved { .. } => StepStatus::Approved,
            StepState::Rejected { .. } => StepStatus::Rejected,
            StepState::Skipped { .. } => StepStatus::Skipped,
        }
    }
}

/// One unit of work within an instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, JsonSchema)]
#[ts(export)]
pub struct WorkflowStep {
    pub id: Uuid,

    /// Owning instance
    pub instance_id: Uuid,

    /// Matches the template step's order
    pub order: u32,

    pub name: String,

    /// Role key of the agent executing this step, set on claim if absent
    #[serde(default)]
    pub agent_role: Option<String>,

    /// 1 for the first try at this order, incremented per retry
    pub attempt: u32,

    /// Input handed to the agent
    #[serde(default)]
    pub input: Option<String>,

    /// Reviewer feedback from the rejected attempt this step retries
    #[serde(default)]
    pub feedback: Option<String>,

    pub state: StepState,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowStep {
    /// Create a fresh pending step
    pub fn pending(
        instance_id: Uuid,
        order: u32,
        name: impl Into<String>,
        agent_role: Option<String>,
        input: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            instance_id,
            order,
            name: name.into(),
            agent_role,
            attempt: 1,
            input,
            feedback: None,
            state: StepState::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn status(&self) -> StepStatus {
        self.state.status()
    }

    /// Not yet approved, rejected, or skipped
    pub fn is_live(&self) -> bool {
        self.status().is_live()
    }

    /// Output submitted by the agent, if the step got that far
    pub fn output(&self) -> Option<&str> {
        match &self.state {
            StepState::AwaitingReview { output, .. }
            | StepState::Approved { output, .. }
            | StepState::Rejected { output, .. } => output.as_deref(),
            _ => None,
        }
    }

    /// Reason recorded when the step was rejected
    pub fn rejection_reason(&self) -> Option<&str> {
        match &self.state {
            StepState::Rejected { reason, .. } => Some(reason),
            _ => None,
        }
    }
}

/// A running execution of a template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, JsonSchema)]
#[ts(export)]
pub struct WorkflowInstance {
    pub id: Uuid,
    pub template_id: Uuid,

    /// Template name at creation, for display
    pub template_name: String,

    /// 1-based cursor; 0 only before the first step exists
    pub current_step: u32,

    /// Copied from the template at creation, never changes
    pub total_steps: u32,

    pub status: InstanceStatus,

    /// The single step currently allowed to transition
    #[serde(default)]
    pub active_step_id: Option<Uuid>,

    /// Input handed to the first step
    #[serde(default)]
    pub input: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Aggregate instance status, a projection of cursor and status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, JsonSchema)]
#[ts(export)]
pub struct InstanceSummary {
    pub id: Uuid,
    pub template_id: Uuid,
    pub current_step: u32,
    pub total_steps: u32,
    pub status: InstanceStatus,
}

impl From<&WorkflowInstance> for InstanceSummary {
    fn from(instance: &WorkflowInstance) -> Self {
        Self {
            id: instance.id,
            template_id: instance.template_id,
            current_step: instance.current_step,
            total_steps: instance.total_steps,
            status: instance.status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_status_round_trips_through_str() {
        for status in InstanceStatus::ALL {
            assert_eq!(status.as_str().parse::<InstanceStatus>(), Ok(status));
        }
        assert!("paused".parse::<InstanceStatus>().is_err());
    }

    #[test]
    fn test_instance_status_serializes_snake_case() {
        let json = serde_json::to_string(&InstanceStatus::PausedForReview).unwrap();
        assert_eq!(json, "\"paused_for_review\"");
    }

    #[test]
    fn test_live_statuses() {
        assert!(StepStatus::Pending.is_live());
        assert!(StepStatus::AgentWorking.is_live());
        assert!(StepStatus::AwaitingReview.is_live());
        assert!(!StepStatus::Approved.is_live());
        assert!(!StepStatus::Rejected.is_live());
        assert!(!StepStatus::Skipped.is_live());
    }

    #[test]
    fn test_step_state_is_tagged_by_status() {
        let now = Utc::now();
        let state = StepState::AwaitingReview {
            started_at: now,
            submitted_at: now,
            output: Some("draft".to_string()),
        };
        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value["status"], "awaiting_review");
        assert_eq!(value["output"], "draft");

        let pending = serde_json::to_value(StepState::Pending).unwrap();
        assert_eq!(pending["status"], "pending");
    }

    #[test]
    fn test_output_only_after_submission() {
        let now = Utc::now();
        let mut step = WorkflowStep::pending(Uuid::new_v4(), 1, "Draft", None, None, now);
        assert!(step.output().is_none());

        step.state = StepState::Rejected {
            submitted_at: now,
            reviewed_at: now,
            output: Some("v1".to_string()),
            reason: "too long".to_string(),
        };
        assert_eq!(step.output(), Some("v1"));
        assert_eq!(step.rejection_reason(), Some("too long"));
        assert!(!step.is_live());
    }
}
