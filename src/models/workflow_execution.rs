//! # Workflow Execution Model
//!
//! One run of a workflow definition. Task executions, review points and
//! variables belong exclusively to their workflow execution and are
//! removed with it.

use crate::state_machine::WorkflowStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// One run of a workflow definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowExecution {
    pub id: Uuid,
    pub workflow_definition_id: Uuid,
    /// Externally supplied (or generated) unique tag for cross-system lookup
    pub correlation_id: String,
    pub status: WorkflowStatus,
    pub started_at: Option<DateTime<Utc>>,
    /// Set exactly when the execution enters a terminal status
    pub completed_at: Option<DateTime<Utc>>,
    /// Index of the task currently being driven by the strategy
    pub current_task_index: usize,
    /// Workflow-level retry count, incremented by operator retries
    pub retry_count: u32,
    pub error_message: Option<String>,
    /// Shared mutable state for the run; merged with task outputs
    pub variables: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
}

impl WorkflowExecution {
    /// Create a new execution in `Created` status.
    pub fn new(
        workflow_definition_id: Uuid,
        correlation_id: Option<String>,
        variables: HashMap<String, String>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            workflow_definition_id,
            correlation_id: correlation_id.unwrap_or_else(|| Uuid::now_v7().to_string()),
            status: WorkflowStatus::Created,
            started_at: None,
            completed_at: None,
            current_task_index: 0,
            retry_count: 0,
            error_message: None,
            variables,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_execution_starts_created() {
        let execution = WorkflowExecution::new(Uuid::now_v7(), None, HashMap::new());
        assert_eq!(execution.status, WorkflowStatus::Created);
        assert_eq!(execution.current_task_index, 0);
        assert!(execution.started_at.is_none());
        assert!(execution.completed_at.is_none());
        assert!(!execution.correlation_id.is_empty());
    }

    #[test]
    fn supplied_correlation_id_is_kept() {
        let execution = WorkflowExecution::new(
            Uuid::now_v7(),
            Some("order-4711".to_string()),
            HashMap::new(),
        );
        assert_eq!(execution.correlation_id, "order-4711");
    }
}
