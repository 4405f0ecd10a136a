//! Pure step transitions.
//!
//! Every transition checks the current state and either moves the step forward
//! or leaves it untouched and returns a [`TransitionError`]. There is no path
//! from `agent_working` to `approved`: review is always an observable state.

use std::fmt;

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::error::WorkflowError;
use crate::types::{StepState, StepStatus, WorkflowStep};

/// Something that can be done to a step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepAction {
    Claim,
    Submit,
    Approve,
    Reject,
    Skip,
    Retry,
}

impl fmt::Display for StepAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StepAction::Claim => "claim",
            StepAction::Submit => "submit",
            StepAction::Approve => "approve",
            StepAction::Reject => "reject",
            StepAction::Skip => "skip",
            StepAction::Retry => "retry",
        };
        f.write_str(name)
    }
}

/// Errors specific to step transitions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("cannot {action} step {step_id} while it is {from}")]
    Forbidden {
        step_id: Uuid,
        action: StepAction,
        from: StepStatus,
    },

    #[error("step {step_id} is routed to role '{expected}', not '{actual}'")]
    RoleMismatch {
        step_id: Uuid,
        expected: String,
        actual: String,
    },

    #[error("rejecting a step requires a reason")]
    MissingReason,
}

impl From<TransitionError> for WorkflowError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::MissingReason => WorkflowError::InvalidInput(err.to_string()),
            other => WorkflowError::InvalidState(other.to_string()),
        }
    }
}

impl WorkflowStep {
    fn forbidden(&self, action: StepAction) -> TransitionError {
        TransitionError::Forbidden {
            step_id: self.id,
            action,
            from: self.status(),
        }
    }

    /// `pending → agent_working`. Assigns `agent_role` if the step had none.
    pub fn claim(&mut self, agent_role: &str, now: DateTime<Utc>) -> Result<(), TransitionError> {
        if self.status() != StepStatus::Pending {
            return Err(self.forbidden(StepAction::Claim));
        }
        if let Some(expected) = &self.agent_role {
            if expected != agent_role {
                return Err(TransitionError::RoleMismatch {
                    step_id: self.id,
                    expected: expected.clone(),
                    actual: agent_role.to_string(),
                });
            }
        }

        self.agent_role = Some(agent_role.to_string());
        self.state = StepState::AgentWorking { started_at: now };
        self.updated_at = now;
        Ok(())
    }

    /// `agent_working → awaiting_review`
    pub fn submit(
        &mut self,
        output: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        let StepState::AgentWorking { started_at } = self.state else {
            return Err(self.forbidden(StepAction::Submit));
        };

        self.state = StepState::AwaitingReview {
            started_at,
            submitted_at: now,
            output,
        };
        self.updated_at = now;
        Ok(())
    }

    /// `awaiting_review → approved`
    pub fn approve(
        &mut self,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        let StepState::AwaitingReview {
            submitted_at,
            output,
            ..
        } = &self.state
        else {
            return Err(self.forbidden(StepAction::Approve));
        };

        self.state = StepState::Approved {
            submitted_at: *submitted_at,
            reviewed_at: now,
            output: output.clone(),
            notes,
        };
        self.updated_at = now;
        Ok(())
    }

    /// `awaiting_review → rejected`, recording a non-empty reason
    pub fn reject(&mut self, reason: &str, now: DateTime<Utc>) -> Result<(), TransitionError> {
        let StepState::AwaitingReview {
            submitted_at,
            output,
            ..
        } = &self.state
        else {
            return Err(self.forbidden(StepAction::Reject));
        };

        let reason = reason.trim();
        if reason.is_empty() {
            return Err(TransitionError::MissingReason);
        }

        self.state = StepState::Rejected {
            submitted_at: *submitted_at,
            reviewed_at: now,
            output: output.clone(),
            reason: reason.to_string(),
        };
        self.updated_at = now;
        Ok(())
    }

    /// Any live state `→ skipped` (instance cancelled)
    pub fn skip(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        if !self.is_live() {
            return Err(self.forbidden(StepAction::Skip));
        }
        self.state = StepState::Skipped { skipped_at: now };
        self.updated_at = now;
        Ok(())
    }

    /// Build the fresh pending step that retries this rejected one.
    ///
    /// The retry keeps order, role, and input, and carries the rejection reason
    /// as feedback.
    pub fn retry(&self, now: DateTime<Utc>) -> Result<WorkflowStep, TransitionError> {
        let Some(reason) = self.rejection_reason() else {
            return Err(self.forbidden(StepAction::Retry));
        };

        let mut retry = WorkflowStep::pending(
            self.instance_id,
            self.order,
            self.name.clone(),
            self.agent_role.clone(),
            self.input.clone(),
            now,
        );
        retry.attempt = self.attempt + 1;
        retry.feedback = Some(reason.to_string());
        Ok(retry)
    }
}
