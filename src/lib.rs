//! Mission Control - workflow orchestration and derived status for agent teams
//!
//! The library holds the engine (workflow coordinator, step state machine,
//! status registry, agent activity) and the REST surface built on it. The
//! `mission-control` binary and the `generate_types` binary both link it.

pub mod agents;
pub mod clock;
pub mod config;
pub mod error;
pub mod logging;
pub mod rest;
pub mod services;
pub mod status;
pub mod steps;
pub mod store;
pub mod types;
pub mod workflow;

pub use error::{WorkflowError, WorkflowResult};
