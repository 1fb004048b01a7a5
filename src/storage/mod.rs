//! # Storage Boundary
//!
//! Async repository traits for definitions, executions, tasks and review
//! points. The orchestration core talks only to these traits; the bundled
//! in-memory implementation backs tests and embedded use. A relational
//! implementation maps them onto the documented table layout
//! (`workflow_definitions`, `workflow_executions`, `task_executions`,
//! `user_review_points` and their key/value side tables).

pub mod memory;

use crate::error::Result;
use crate::models::{TaskExecution, UserReviewPoint, WorkflowDefinition, WorkflowExecution};
use crate::state_machine::WorkflowStatus;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub use memory::{
    InMemoryReviewPointStore, InMemoryTaskExecutionStore, InMemoryWorkflowDefinitionStore,
    InMemoryWorkflowExecutionStore,
};

/// Store for workflow definitions; identity `(name, version)` is unique.
#[async_trait]
pub trait WorkflowDefinitionStore: Send + Sync {
    /// Persist a new definition. Fails when `(name, version)` exists.
    async fn insert(&self, definition: WorkflowDefinition) -> Result<WorkflowDefinition>;

    async fn get(&self, id: Uuid) -> Result<WorkflowDefinition>;

    async fn find_by_name_and_version(
        &self,
        name: &str,
        version: &str,
    ) -> Result<Option<WorkflowDefinition>>;

    /// Most recent version registered under `name`, by creation time.
    async fn find_latest_by_name(&self, name: &str) -> Result<Option<WorkflowDefinition>>;

    async fn list(&self) -> Result<Vec<WorkflowDefinition>>;

    async fn delete(&self, id: Uuid) -> Result<()>;
}

/// Store for workflow executions; `correlation_id` is unique.
#[async_trait]
pub trait WorkflowExecutionStore: Send + Sync {
    /// Persist a new execution. Fails on duplicate correlation id.
    async fn insert(&self, execution: WorkflowExecution) -> Result<WorkflowExecution>;

    /// Persist changes to an existing execution.
    async fn update(&self, execution: WorkflowExecution) -> Result<WorkflowExecution>;

    async fn get(&self, id: Uuid) -> Result<WorkflowExecution>;

    async fn find_by_correlation_id(&self, correlation_id: &str)
        -> Result<Option<WorkflowExecution>>;

    async fn find_by_status(&self, status: WorkflowStatus) -> Result<Vec<WorkflowExecution>>;

    /// Terminal executions whose `completed_at` precedes the cutoff.
    async fn find_completed_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<WorkflowExecution>>;

    /// Paused executions whose `started_at` precedes the cutoff.
    async fn find_paused_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<WorkflowExecution>>;

    async fn delete(&self, id: Uuid) -> Result<()>;
}

/// Store for task executions.
#[async_trait]
pub trait TaskExecutionStore: Send + Sync {
    async fn insert(&self, task: TaskExecution) -> Result<TaskExecution>;

    async fn update(&self, task: TaskExecution) -> Result<TaskExecution>;

    async fn get(&self, id: Uuid) -> Result<TaskExecution>;

    /// Tasks of one workflow in creation order.
    async fn list_for_workflow(&self, workflow_execution_id: Uuid) -> Result<Vec<TaskExecution>>;

    /// Tasks in `AwaitingRetry` whose `next_retry_at` is due.
    async fn find_due_for_retry(&self, now: DateTime<Utc>) -> Result<Vec<TaskExecution>>;

    async fn delete_for_workflow(&self, workflow_execution_id: Uuid) -> Result<()>;
}

/// Store for user review points.
#[async_trait]
pub trait ReviewPointStore: Send + Sync {
    async fn insert(&self, point: UserReviewPoint) -> Result<UserReviewPoint>;

    async fn update(&self, point: UserReviewPoint) -> Result<UserReviewPoint>;

    async fn get(&self, id: Uuid) -> Result<UserReviewPoint>;

    /// Review points of one workflow in creation order.
    async fn list_for_workflow(&self, workflow_execution_id: Uuid)
        -> Result<Vec<UserReviewPoint>>;

    async fn delete_for_workflow(&self, workflow_execution_id: Uuid) -> Result<()>;
}
