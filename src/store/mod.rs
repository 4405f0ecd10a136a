//! Document store contract.
//!
//! The workflow engine treats persistence as an external collaborator. This
//! module defines what it needs from one: lookups by id, indexed lookups by a
//! named field, and versioned all-or-nothing commits that give read-modify-write
//! on a set of documents the same guarantee as a single-row transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::types::{
    Agent, StatusEntry, StepStatus, WorkflowInstance, WorkflowStep, WorkflowTemplate,
};

mod memory;

pub use memory::MemoryStore;

/// Errors specific to store operations
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{collection} '{id}' was modified concurrently")]
    Conflict { collection: &'static str, id: Uuid },

    #[error("{collection} '{id}' already exists")]
    Duplicate { collection: &'static str, id: Uuid },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A document together with its revision counter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Versioned<T> {
    pub version: u64,
    pub doc: T,
}

/// Precondition a commit checks before writing a document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    /// The document must not exist yet
    Absent,
    /// The document must still be at this version
    Version(u64),
}

/// A document write and its precondition
#[derive(Debug, Clone)]
pub struct Write<T> {
    pub doc: T,
    pub expect: Expect,
}

/// Writes and read guards applied atomically by [`Store::commit`]
#[derive(Debug, Default, Clone)]
pub struct ChangeSet {
    pub instances: Vec<Write<WorkflowInstance>>,
    pub steps: Vec<Write<WorkflowStep>>,
    /// Instances that were read and must be unchanged, without being written
    pub instance_guards: Vec<(Uuid, u64)>,
    /// Steps that were read and must be unchanged, without being written
    pub step_guards: Vec<(Uuid, u64)>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_instance(&mut self, instance: WorkflowInstance) -> &mut Self {
        self.instances.push(Write {
            doc: instance,
            expect: Expect::Absent,
        });
        self
    }

    pub fn update_instance(&mut self, instance: WorkflowInstance, version: u64) -> &mut Self {
        self.instances.push(Write {
            doc: instance,
            expect: Expect::Version(version),
        });
        self
    }

    pub fn guard_instance(&mut self, id: Uuid, version: u64) -> &mut Self {
        self.instance_guards.push((id, version));
        self
    }

    pub fn insert_step(&mut self, step: WorkflowStep) -> &mut Self {
        self.steps.push(Write {
            doc: step,
            expect: Expect::Absent,
        });
        self
    }

    pub fn update_step(&mut self, step: WorkflowStep, version: u64) -> &mut Self {
        self.steps.push(Write {
            doc: step,
            expect: Expect::Version(version),
        });
        self
    }

    pub fn guard_step(&mut self, id: Uuid, version: u64) -> &mut Self {
        self.step_guards.push((id, version));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
            && self.steps.is_empty()
            && self.instance_guards.is_empty()
            && self.step_guards.is_empty()
    }
}

/// Persistence contract consumed by the workflow engine
#[async_trait]
pub trait Store: Send + Sync {
    // -- Templates --

    /// Insert a template. Templates are immutable once stored.
    async fn insert_template(&self, template: WorkflowTemplate) -> StoreResult<()>;

    async fn template(&self, id: Uuid) -> StoreResult<Option<WorkflowTemplate>>;

    async fn templates(&self) -> StoreResult<Vec<WorkflowTemplate>>;

    // -- Instances and steps --

    async fn instance(&self, id: Uuid) -> StoreResult<Option<Versioned<WorkflowInstance>>>;

    async fn instances(&self) -> StoreResult<Vec<WorkflowInstance>>;

    /// Delete an instance and every step it owns. Returns false if absent.
    async fn delete_instance(&self, id: Uuid) -> StoreResult<bool>;

    async fn step(&self, id: Uuid) -> StoreResult<Option<Versioned<WorkflowStep>>>;

    /// Steps of one instance ordered by (order, attempt)
    async fn steps_for_instance(&self, instance_id: Uuid) -> StoreResult<Vec<WorkflowStep>>;

    /// Steps across all instances whose status is one of `statuses`
    async fn steps_with_status(&self, statuses: &[StepStatus])
        -> StoreResult<Vec<WorkflowStep>>;

    /// Check every precondition in `changes`, then apply all writes or none.
    /// A failed precondition yields [`StoreError::Conflict`].
    async fn commit(&self, changes: ChangeSet) -> StoreResult<()>;

    // -- Agents --

    async fn agents(&self) -> StoreResult<Vec<Agent>>;

    async fn agent_by_name(&self, name: &str) -> StoreResult<Option<Agent>>;

    async fn agent_by_role(&self, agent_role: &str) -> StoreResult<Option<Agent>>;

    async fn agent(&self, id: Uuid) -> StoreResult<Option<Agent>>;

    /// Insert `agent`, or replace the agent with the same name as one
    /// operation. A replaced agent keeps its id and `created_at`. Returns the
    /// stored agent.
    async fn upsert_agent(&self, agent: Agent) -> StoreResult<Agent>;

    // -- System status --

    async fn status_entry(&self, key: &str) -> StoreResult<Option<StatusEntry>>;

    async fn status_entries(&self) -> StoreResult<Vec<StatusEntry>>;

    /// Create the entry for `key` or patch it in place, keeping its id.
    ///
    /// Last write wins on `updated_at`: a report older than the stored entry
    /// is ignored and the existing id is returned.
    async fn upsert_status(
        &self,
        key: &str,
        status: &str,
        details: Option<String>,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<Uuid>;
}
