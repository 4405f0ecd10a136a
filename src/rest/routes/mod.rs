//! Route handlers for the REST API.

pub mod agents;
pub mod health;
pub mod instances;
pub mod status;
pub mod steps;
pub mod templates;
