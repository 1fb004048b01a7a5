use crate::state_machine::StateMachineError;

/// Top-level error type for orchestration operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum WorkflowError {
    /// Malformed definition or missing required configuration
    #[error("validation error: {0}")]
    Validation(String),

    /// Unknown entity id surfaced to the caller, never retried
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Illegal lifecycle transition
    #[error("state error: {0}")]
    State(#[from] StateMachineError),

    /// Engine-level misconfiguration, fatal for the workflow
    #[error("configuration error: {0}")]
    Configuration(String),

    /// No executor registered for a task type
    #[error("no executor registered for task type: {0}")]
    NoExecutor(String),

    /// Queue publish/consume failure
    #[error("messaging error: {0}")]
    Messaging(String),

    /// Failure raised while driving a task
    #[error("task execution error: {0}")]
    TaskExecution(String),

    /// Storage-layer failure (duplicate keys, lost records)
    #[error("storage error: {0}")]
    Storage(String),
}

impl WorkflowError {
    /// Convenience constructor for `NotFound` with any displayable id.
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl From<serde_json::Error> for WorkflowError {
    fn from(error: serde_json::Error) -> Self {
        WorkflowError::Validation(format!("JSON serialization error: {error}"))
    }
}

pub type Result<T> = std::result::Result<T, WorkflowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_formats_entity_and_id() {
        let err = WorkflowError::not_found("task execution", 42);
        assert_eq!(err.to_string(), "task execution not found: 42");
    }

    #[test]
    fn state_machine_errors_convert() {
        let err: WorkflowError = StateMachineError::InvalidTransition {
            from: "completed".to_string(),
            to: "running".to_string(),
        }
        .into();
        assert!(matches!(err, WorkflowError::State(_)));
    }
}
