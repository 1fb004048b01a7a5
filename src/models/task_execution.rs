//! # Task Execution Model
//!
//! One run of one task definition inside a workflow execution.

use crate::models::workflow_definition::{ExecutionMode, TaskDefinition};
use crate::state_machine::TaskStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// One run of one task definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskExecution {
    pub id: Uuid,
    pub workflow_execution_id: Uuid,
    pub task_definition_id: Uuid,
    pub status: TaskStatus,
    pub started_at: Option<DateTime<Utc>>,
    /// Set exactly when the task enters a terminal status
    pub completed_at: Option<DateTime<Utc>>,
    pub execution_mode: ExecutionMode,
    /// Attempts consumed; never exceeds the definition's retry limit
    pub retry_count: u32,
    /// Due time for the next attempt while in `AwaitingRetry`
    pub next_retry_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub inputs: HashMap<String, String>,
    pub outputs: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
}

impl TaskExecution {
    /// Create a new pending task execution for a definition.
    pub fn new(
        workflow_execution_id: Uuid,
        definition: &TaskDefinition,
        inputs: HashMap<String, String>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            workflow_execution_id,
            task_definition_id: definition.id,
            status: TaskStatus::Pending,
            started_at: None,
            completed_at: None,
            execution_mode: definition.execution_mode,
            retry_count: 0,
            next_retry_at: None,
            error_message: None,
            inputs,
            outputs: HashMap::new(),
            created_at: Utc::now(),
        }
    }

    /// Clear run state so the task can be driven again from scratch.
    pub fn reset_for_rerun(&mut self) {
        self.status = TaskStatus::Pending;
        self.started_at = None;
        self.completed_at = None;
        self.next_retry_at = None;
        self.error_message = None;
        self.retry_count = 0;
        self.outputs.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_task_is_pending_with_definition_mode() {
        let mut definition = TaskDefinition::new("fetch", "http", 0);
        definition.execution_mode = ExecutionMode::Queued;
        let task = TaskExecution::new(Uuid::now_v7(), &definition, HashMap::new());
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.execution_mode, ExecutionMode::Queued);
        assert_eq!(task.retry_count, 0);
    }

    #[test]
    fn reset_clears_run_state() {
        let definition = TaskDefinition::new("fetch", "http", 0);
        let mut task = TaskExecution::new(Uuid::now_v7(), &definition, HashMap::new());
        task.status = TaskStatus::Failed;
        task.started_at = Some(Utc::now());
        task.completed_at = Some(Utc::now());
        task.retry_count = 3;
        task.error_message = Some("boom".to_string());
        task.outputs.insert("k".to_string(), "v".to_string());

        task.reset_for_rerun();

        assert_eq!(task.status, TaskStatus::Pending);
        assert!(task.started_at.is_none());
        assert!(task.completed_at.is_none());
        assert!(task.error_message.is_none());
        assert_eq!(task.retry_count, 0);
        assert!(task.outputs.is_empty());
    }
}
