use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Workflow lifecycle event kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowEventType {
    Created,
    Started,
    Completed,
    Failed,
    Paused,
    Resumed,
    Cancelled,
    Retry,
    StatusChanged,
}

/// Task lifecycle event kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskEventType {
    Created,
    Started,
    Completed,
    Failed,
    Skipped,
    RetryScheduled,
}

/// User review event kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserReviewEventType {
    Requested,
    Completed,
}

/// Event describing a workflow execution transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowEvent {
    pub event_type: WorkflowEventType,
    pub workflow_execution_id: Uuid,
    pub workflow_name: String,
    pub correlation_id: String,
    pub occurred_at: DateTime<Utc>,
    pub attributes: HashMap<String, serde_json::Value>,
}

/// Event describing a task execution transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEvent {
    pub event_type: TaskEventType,
    pub workflow_execution_id: Uuid,
    pub task_execution_id: Uuid,
    pub task_name: String,
    pub correlation_id: String,
    pub occurred_at: DateTime<Utc>,
    pub attributes: HashMap<String, serde_json::Value>,
}

/// Event describing a review point transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserReviewEvent {
    pub event_type: UserReviewEventType,
    pub workflow_execution_id: Uuid,
    pub task_execution_id: Uuid,
    pub review_point_id: Uuid,
    pub correlation_id: String,
    pub occurred_at: DateTime<Utc>,
    pub attributes: HashMap<String, serde_json::Value>,
}

/// Any lifecycle event published by the orchestration core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OrchestrationEvent {
    Workflow(WorkflowEvent),
    Task(TaskEvent),
    UserReview(UserReviewEvent),
}

impl OrchestrationEvent {
    /// Short human-readable description used for event logging.
    pub fn describe(&self) -> String {
        match self {
            Self::Workflow(e) => format!(
                "workflow {} {:?} (correlation {})",
                e.workflow_execution_id, e.event_type, e.correlation_id
            ),
            Self::Task(e) => format!(
                "task {} '{}' {:?} (workflow {})",
                e.task_execution_id, e.task_name, e.event_type, e.workflow_execution_id
            ),
            Self::UserReview(e) => format!(
                "review point {} {:?} (workflow {})",
                e.review_point_id, e.event_type, e.workflow_execution_id
            ),
        }
    }
}

impl fmt::Display for OrchestrationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.describe())
    }
}
