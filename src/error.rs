//! Error taxonomy for workflow and status operations.

use thiserror::Error;
use uuid::Uuid;

use crate::store::StoreError;

/// Errors returned by the workflow coordinator and the registries
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("{kind} '{id}' was modified concurrently, re-fetch and retry")]
    ConcurrentModification { kind: &'static str, id: Uuid },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("store error: {0}")]
    Store(StoreError),
}

impl WorkflowError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        WorkflowError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        WorkflowError::InvalidState(message.into())
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        WorkflowError::InvalidInput(message.into())
    }

    /// Whether the caller can simply retry the same operation
    pub fn is_retryable(&self) -> bool {
        matches!(self, WorkflowError::ConcurrentModification { .. })
    }
}

impl From<StoreError> for WorkflowError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { collection, id } => WorkflowError::ConcurrentModification {
                kind: collection,
                id,
            },
            other => WorkflowError::Store(other),
        }
    }
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_maps_to_concurrent_modification() {
        let id = Uuid::new_v4();
        let err: WorkflowError = StoreError::Conflict {
            collection: "instance",
            id,
        }
        .into();
        assert!(err.is_retryable());
        assert!(matches!(
            err,
            WorkflowError::ConcurrentModification { kind: "instance", id: got } if got == id
        ));
    }

    #[test]
    fn test_display() {
        let err = WorkflowError::not_found("template", "abc");
        assert_eq!(err.to_string(), "template 'abc' not found");

        let err = WorkflowError::invalid_state("instance is already completed");
        assert_eq!(err.to_string(), "invalid state: instance is already completed");
        assert!(!err.is_retryable());
    }
}
