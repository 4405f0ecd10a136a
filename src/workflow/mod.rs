//! Workflow templates and the instance coordinator.

mod coordinator;
pub mod templates;

pub use coordinator::{Approval, InstanceDetail, WorkflowCoordinator};
pub use templates::{load_definition_file, load_definitions_dir, validate_definition};
