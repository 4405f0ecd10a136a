//! Step lifecycle for workflow steps.
//!
//! `pending → agent_working → awaiting_review → approved | rejected`
//!
//! Transitions are pure methods on [`WorkflowStep`](crate::types::WorkflowStep);
//! the coordinator decides which step may move and persists the result.

pub mod transition;

pub use transition::{StepAction, TransitionError};
