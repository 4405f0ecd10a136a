//! Domain documents for the mission control store.
//!
//! These types use ts-rs and schemars to generate TypeScript definitions
//! and JSON schemas for the dashboard from a single Rust source of truth.

mod agent;
mod status;
mod template;
mod workflow;

pub use agent::{Activity, Agent, AgentProfile, AgentType};
pub use status::{StatusEntry, StatusReading};
pub use template::{StepSpec, TemplateDefinition, WorkflowTemplate};
pub use workflow::{
    InstanceStatus, InstanceSummary, StepState, StepStatus, WorkflowInstance, WorkflowStep,
};
