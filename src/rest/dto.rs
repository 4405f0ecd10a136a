//! Data Transfer Objects for the REST API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

// Note: ToSchema is derived on all DTOs for OpenAPI documentation generation

use crate::agents::AgentActivity;
use crate::types::{
    Agent, AgentProfile, AgentType, InstanceSummary, StatusReading, StepSpec, StepState,
    TemplateDefinition, WorkflowInstance, WorkflowStep, WorkflowTemplate,
};
use crate::workflow::InstanceDetail;

// =============================================================================
// Health DTOs
// =============================================================================

/// Health check response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

// =============================================================================
// Status DTOs
// =============================================================================

/// Effective status of a key
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StatusReadingResponse {
    pub key: String,
    /// Stored status, "offline" when stale, or "unknown" when never reported
    pub status: String,
    pub updated_at: Option<DateTime<Utc>>,
    pub details: Option<String>,
}

impl From<StatusReading> for StatusReadingResponse {
    fn from(reading: StatusReading) -> Self {
        Self {
            key: reading.key,
            status: reading.status,
            updated_at: reading.updated_at,
            details: reading.details,
        }
    }
}

/// Request to report a status
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpsertStatusRequest {
    pub key: String,
    pub status: String,
    #[serde(default)]
    pub details: Option<String>,
    /// When the reporter observed this status; defaults to now. Older reports
    /// than the stored one are ignored.
    #[serde(default)]
    pub reported_at: Option<DateTime<Utc>>,
}

/// Response after reporting a status
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpsertStatusResponse {
    pub id: Uuid,
}

// =============================================================================
// Agent DTOs
// =============================================================================

/// Response for a single agent
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AgentResponse {
    pub id: Uuid,
    pub name: String,
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_role: Option<String>,
    pub agent_type: String,
    pub parent_agent_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn agent_type_name(agent_type: AgentType) -> String {
    match agent_type {
        AgentType::Agent => "agent".to_string(),
        AgentType::Subagent => "subagent".to_string(),
    }
}

impl From<&Agent> for AgentResponse {
    fn from(agent: &Agent) -> Self {
        Self {
            id: agent.id,
            name: agent.name.clone(),
            role: agent.role.clone(),
            agent_role: agent.agent_role.clone(),
            agent_type: agent_type_name(agent.agent_type),
            parent_agent_ids: agent.parent_agent_ids.clone(),
            created_at: agent.created_at,
            updated_at: agent.updated_at,
        }
    }
}

/// Request to create or update an agent by name
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpsertAgentRequest {
    pub name: String,
    pub role: String,
    #[serde(default)]
    pub agent_role: Option<String>,
    /// "agent" (default) or "subagent"
    #[serde(default)]
    pub agent_type: Option<String>,
    #[serde(default)]
    pub parent_agent_ids: Vec<Uuid>,
}

impl UpsertAgentRequest {
    /// Convert to an agent profile, validating the agent type
    pub fn into_profile(self) -> Result<AgentProfile, String> {
        let agent_type = match self.agent_type.as_deref() {
            None | Some("agent") => AgentType::Agent,
            Some("subagent") => AgentType::Subagent,
            Some(other) => return Err(format!("unknown agent type '{other}'")),
        };
        Ok(AgentProfile {
            name: self.name,
            role: self.role,
            agent_role: self.agent_role,
            agent_type,
            parent_agent_ids: self.parent_agent_ids,
        })
    }
}

/// An agent with its derived activity
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AgentActivityResponse {
    pub id: Uuid,
    pub name: String,
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_role: Option<String>,
    pub agent_type: String,
    /// "working", "waiting", or "idle"
    pub activity: String,
}

impl From<&AgentActivity> for AgentActivityResponse {
    fn from(a: &AgentActivity) -> Self {
        Self {
            id: a.id,
            name: a.name.clone(),
            role: a.role.clone(),
            agent_role: a.agent_role.clone(),
            agent_type: agent_type_name(a.agent_type),
            activity: a.activity.to_string(),
        }
    }
}

// =============================================================================
// Template DTOs
// =============================================================================

/// One step of a template
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StepSpecDto {
    pub order: u32,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl From<&StepSpec> for StepSpecDto {
    fn from(spec: &StepSpec) -> Self {
        Self {
            order: spec.order,
            name: spec.name.clone(),
            agent_role: spec.agent_role.clone(),
            description: spec.description.clone(),
        }
    }
}

impl From<StepSpecDto> for StepSpec {
    fn from(dto: StepSpecDto) -> Self {
        Self {
            order: dto.order,
            name: dto.name,
            agent_role: dto.agent_role,
            description: dto.description,
        }
    }
}

/// Request to create a template
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateTemplateRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub steps: Vec<StepSpecDto>,
}

impl From<CreateTemplateRequest> for TemplateDefinition {
    fn from(req: CreateTemplateRequest) -> Self {
        Self {
            name: req.name,
            description: req.description,
            steps: req.steps.into_iter().map(StepSpec::from).collect(),
        }
    }
}

/// Response for a single template
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TemplateResponse {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub total_steps: u32,
    pub steps: Vec<StepSpecDto>,
    pub created_at: DateTime<Utc>,
}

impl From<&WorkflowTemplate> for TemplateResponse {
    fn from(t: &WorkflowTemplate) -> Self {
        Self {
            id: t.id,
            name: t.name.clone(),
            description: t.description.clone(),
            total_steps: t.total_steps(),
            steps: t.steps.iter().map(StepSpecDto::from).collect(),
            created_at: t.created_at,
        }
    }
}

// =============================================================================
// Instance DTOs
// =============================================================================

/// Request to start an instance of a template
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateInstanceRequest {
    pub template_id: Uuid,
    /// Input handed to the first step
    #[serde(default)]
    pub input: Option<String>,
}

/// Response after creating an instance
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateInstanceResponse {
    pub id: Uuid,
}

/// Query parameters for listing instances
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct InstanceListQuery {
    /// Only instances in this status (active, running, paused_for_review,
    /// completed, cancelled)
    pub status: Option<String>,
}

/// Cursor, total, and status of an instance
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct InstanceSummaryResponse {
    pub id: Uuid,
    pub template_id: Uuid,
    pub current_step: u32,
    pub total_steps: u32,
    pub status: String,
}

impl From<InstanceSummary> for InstanceSummaryResponse {
    fn from(s: InstanceSummary) -> Self {
        Self {
            id: s.id,
            template_id: s.template_id,
            current_step: s.current_step,
            total_steps: s.total_steps,
            status: s.status.to_string(),
        }
    }
}

/// Response for a single instance
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct InstanceResponse {
    pub id: Uuid,
    pub template_id: Uuid,
    pub template_name: String,
    pub current_step: u32,
    pub total_steps: u32,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_step_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&WorkflowInstance> for InstanceResponse {
    fn from(i: &WorkflowInstance) -> Self {
        Self {
            id: i.id,
            template_id: i.template_id,
            template_name: i.template_name.clone(),
            current_step: i.current_step,
            total_steps: i.total_steps,
            status: i.status.to_string(),
            active_step_id: i.active_step_id,
            input: i.input.clone(),
            created_at: i.created_at,
            updated_at: i.updated_at,
            completed_at: i.completed_at,
        }
    }
}

/// An instance with all of its steps
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct InstanceDetailResponse {
    pub instance: InstanceResponse,
    pub steps: Vec<StepResponse>,
}

impl From<&InstanceDetail> for InstanceDetailResponse {
    fn from(detail: &InstanceDetail) -> Self {
        Self {
            instance: InstanceResponse::from(&detail.instance),
            steps: detail.steps.iter().map(StepResponse::from).collect(),
        }
    }
}

// =============================================================================
// Step DTOs
// =============================================================================

/// Response for a single workflow step, with its state flattened
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StepResponse {
    pub id: Uuid,
    pub instance_id: Uuid,
    pub order: u32,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_role: Option<String>,
    pub attempt: u32,
    /// pending, agent_working, awaiting_review, approved, rejected, or skipped
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&WorkflowStep> for StepResponse {
    fn from(step: &WorkflowStep) -> Self {
        let (started_at, submitted_at, reviewed_at, notes) = match &step.state {
            StepState::Pending | StepState::Skipped { .. } => (None, None, None, None),
            StepState::AgentWorking { started_at } => (Some(*started_at), None, None, None),
            StepState::AwaitingReview {
                started_at,
                submitted_at,
                ..
            } => (Some(*started_at), Some(*submitted_at), None, None),
            StepState::Approved {
                submitted_at,
                reviewed_at,
                notes,
                ..
            } => (None, Some(*submitted_at), Some(*reviewed_at), notes.clone()),
            StepState::Rejected {
                submitted_at,
                reviewed_at,
                ..
            } => (None, Some(*submitted_at), Some(*reviewed_at), None),
        };

        Self {
            id: step.id,
            instance_id: step.instance_id,
            order: step.order,
            name: step.name.clone(),
            agent_role: step.agent_role.clone(),
            attempt: step.attempt,
            status: step.status().to_string(),
            input: step.input.clone(),
            output: step.output().map(str::to_string),
            feedback: step.feedback.clone(),
            notes,
            rejection_reason: step.rejection_reason().map(str::to_string),
            started_at,
            submitted_at,
            reviewed_at,
            created_at: step.created_at,
            updated_at: step.updated_at,
        }
    }
}

/// Request to claim a step
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ClaimStepRequest {
    /// Role key of the claiming agent
    pub agent_role: String,
}

/// Request to submit a step's output for review
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct SubmitStepRequest {
    #[serde(default)]
    pub output: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Request to approve a step
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApproveStepRequest {
    #[serde(default)]
    pub notes: Option<String>,
    /// Advance the instance right after approval unless it is paused
    #[serde(default = "default_true")]
    pub advance: bool,
}

/// Response after approving a step
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApproveStepResponse {
    pub step: StepResponse,
    pub instance: InstanceSummaryResponse,
    /// Whether the instance advanced as part of this request
    pub advanced: bool,
}

/// Request to reject a step
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RejectStepRequest {
    /// Required, non-empty
    pub reason: String,
}

/// Response after rejecting a step
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RejectStepResponse {
    pub rejected_step_id: Uuid,
    /// The fresh pending step retrying the same order
    pub retry_step_id: Uuid,
}
