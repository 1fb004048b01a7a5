//! In-memory store implementations.
//!
//! Entities are keyed by their UUIDv7 ids in `BTreeMap`s, so iteration
//! order matches creation order. Each operation takes the lock once,
//! which linearises state updates the way a transactional store would.

use crate::error::{Result, WorkflowError};
use crate::models::{TaskExecution, UserReviewPoint, WorkflowDefinition, WorkflowExecution};
use crate::state_machine::{TaskStatus, WorkflowStatus};
use crate::storage::{
    ReviewPointStore, TaskExecutionStore, WorkflowDefinitionStore, WorkflowExecutionStore,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-memory workflow definition store.
#[derive(Default)]
pub struct InMemoryWorkflowDefinitionStore {
    definitions: RwLock<BTreeMap<Uuid, WorkflowDefinition>>,
}

impl InMemoryWorkflowDefinitionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkflowDefinitionStore for InMemoryWorkflowDefinitionStore {
    async fn insert(&self, definition: WorkflowDefinition) -> Result<WorkflowDefinition> {
        let mut definitions = self.definitions.write().await;
        let duplicate = definitions
            .values()
            .any(|d| d.name == definition.name && d.version == definition.version);
        if duplicate {
            return Err(WorkflowError::Validation(format!(
                "workflow definition '{}' version '{}' already exists",
                definition.name, definition.version
            )));
        }
        definitions.insert(definition.id, definition.clone());
        Ok(definition)
    }

    async fn get(&self, id: Uuid) -> Result<WorkflowDefinition> {
        self.definitions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| WorkflowError::not_found("workflow definition", id))
    }

    async fn find_by_name_and_version(
        &self,
        name: &str,
        version: &str,
    ) -> Result<Option<WorkflowDefinition>> {
        Ok(self
            .definitions
            .read()
            .await
            .values()
            .find(|d| d.name == name && d.version == version)
            .cloned())
    }

    async fn find_latest_by_name(&self, name: &str) -> Result<Option<WorkflowDefinition>> {
        Ok(self
            .definitions
            .read()
            .await
            .values()
            .filter(|d| d.name == name)
            .max_by_key(|d| d.created_at)
            .cloned())
    }

    async fn list(&self) -> Result<Vec<WorkflowDefinition>> {
        Ok(self.definitions.read().await.values().cloned().collect())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.definitions
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| WorkflowError::not_found("workflow definition", id))
    }
}

/// In-memory workflow execution store.
#[derive(Default)]
pub struct InMemoryWorkflowExecutionStore {
    executions: RwLock<BTreeMap<Uuid, WorkflowExecution>>,
}

impl InMemoryWorkflowExecutionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkflowExecutionStore for InMemoryWorkflowExecutionStore {
    async fn insert(&self, execution: WorkflowExecution) -> Result<WorkflowExecution> {
        let mut executions = self.executions.write().await;
        let duplicate = executions
            .values()
            .any(|e| e.correlation_id == execution.correlation_id);
        if duplicate {
            return Err(WorkflowError::Validation(format!(
                "correlation id '{}' is already in use",
                execution.correlation_id
            )));
        }
        executions.insert(execution.id, execution.clone());
        Ok(execution)
    }

    async fn update(&self, execution: WorkflowExecution) -> Result<WorkflowExecution> {
        let mut executions = self.executions.write().await;
        if !executions.contains_key(&execution.id) {
            return Err(WorkflowError::not_found("workflow execution", execution.id));
        }
        executions.insert(execution.id, execution.clone());
        Ok(execution)
    }

    async fn get(&self, id: Uuid) -> Result<WorkflowExecution> {
        self.executions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| WorkflowError::not_found("workflow execution", id))
    }

    async fn find_by_correlation_id(
        &self,
        correlation_id: &str,
    ) -> Result<Option<WorkflowExecution>> {
        Ok(self
            .executions
            .read()
            .await
            .values()
            .find(|e| e.correlation_id == correlation_id)
            .cloned())
    }

    async fn find_by_status(&self, status: WorkflowStatus) -> Result<Vec<WorkflowExecution>> {
        Ok(self
            .executions
            .read()
            .await
            .values()
            .filter(|e| e.status == status)
            .cloned()
            .collect())
    }

    async fn find_completed_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<WorkflowExecution>> {
        Ok(self
            .executions
            .read()
            .await
            .values()
            .filter(|e| {
                e.status.is_terminal()
                    && e.completed_at.map(|t| t < cutoff).unwrap_or(false)
            })
            .cloned()
            .collect())
    }

    async fn find_paused_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<WorkflowExecution>> {
        Ok(self
            .executions
            .read()
            .await
            .values()
            .filter(|e| {
                e.status == WorkflowStatus::Paused
                    && e.started_at.map(|t| t < cutoff).unwrap_or(false)
            })
            .cloned()
            .collect())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.executions
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| WorkflowError::not_found("workflow execution", id))
    }
}

/// In-memory task execution store.
#[derive(Default)]
pub struct InMemoryTaskExecutionStore {
    tasks: RwLock<BTreeMap<Uuid, TaskExecution>>,
}

impl InMemoryTaskExecutionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskExecutionStore for InMemoryTaskExecutionStore {
    async fn insert(&self, task: TaskExecution) -> Result<TaskExecution> {
        self.tasks.write().await.insert(task.id, task.clone());
        Ok(task)
    }

    async fn update(&self, task: TaskExecution) -> Result<TaskExecution> {
        let mut tasks = self.tasks.write().await;
        if !tasks.contains_key(&task.id) {
            return Err(WorkflowError::not_found("task execution", task.id));
        }
        tasks.insert(task.id, task.clone());
        Ok(task)
    }

    async fn get(&self, id: Uuid) -> Result<TaskExecution> {
        self.tasks
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| WorkflowError::not_found("task execution", id))
    }

    async fn list_for_workflow(&self, workflow_execution_id: Uuid) -> Result<Vec<TaskExecution>> {
        Ok(self
            .tasks
            .read()
            .await
            .values()
            .filter(|t| t.workflow_execution_id == workflow_execution_id)
            .cloned()
            .collect())
    }

    async fn find_due_for_retry(&self, now: DateTime<Utc>) -> Result<Vec<TaskExecution>> {
        Ok(self
            .tasks
            .read()
            .await
            .values()
            .filter(|t| {
                t.status == TaskStatus::AwaitingRetry
                    && t.next_retry_at.map(|due| due <= now).unwrap_or(false)
            })
            .cloned()
            .collect())
    }

    async fn delete_for_workflow(&self, workflow_execution_id: Uuid) -> Result<()> {
        self.tasks
            .write()
            .await
            .retain(|_, t| t.workflow_execution_id != workflow_execution_id);
        Ok(())
    }
}

/// In-memory review point store.
#[derive(Default)]
pub struct InMemoryReviewPointStore {
    points: RwLock<BTreeMap<Uuid, UserReviewPoint>>,
}

impl InMemoryReviewPointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReviewPointStore for InMemoryReviewPointStore {
    async fn insert(&self, point: UserReviewPoint) -> Result<UserReviewPoint> {
        self.points.write().await.insert(point.id, point.clone());
        Ok(point)
    }

    async fn update(&self, point: UserReviewPoint) -> Result<UserReviewPoint> {
        let mut points = self.points.write().await;
        if !points.contains_key(&point.id) {
            return Err(WorkflowError::not_found("review point", point.id));
        }
        points.insert(point.id, point.clone());
        Ok(point)
    }

    async fn get(&self, id: Uuid) -> Result<UserReviewPoint> {
        self.points
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| WorkflowError::not_found("review point", id))
    }

    async fn list_for_workflow(
        &self,
        workflow_execution_id: Uuid,
    ) -> Result<Vec<UserReviewPoint>> {
        Ok(self
            .points
            .read()
            .await
            .values()
            .filter(|p| p.workflow_execution_id == workflow_execution_id)
            .cloned()
            .collect())
    }

    async fn delete_for_workflow(&self, workflow_execution_id: Uuid) -> Result<()> {
        self.points
            .write()
            .await
            .retain(|_, p| p.workflow_execution_id != workflow_execution_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{StrategyType, TaskDefinition};
    use std::collections::HashMap;

    fn sample_definition() -> WorkflowDefinition {
        WorkflowDefinition::new(
            "orders",
            "1.0.0",
            StrategyType::Sequential,
            vec![TaskDefinition::new("fetch", "http", 0)],
        )
    }

    #[tokio::test]
    async fn definition_identity_is_unique() {
        let store = InMemoryWorkflowDefinitionStore::new();
        store.insert(sample_definition()).await.unwrap();
        let err = store.insert(sample_definition()).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));

        let mut v2 = sample_definition();
        v2.version = "2.0.0".to_string();
        store.insert(v2).await.unwrap();
    }

    #[tokio::test]
    async fn correlation_id_is_unique() {
        let store = InMemoryWorkflowExecutionStore::new();
        let first = WorkflowExecution::new(Uuid::now_v7(), Some("c-1".to_string()), HashMap::new());
        store.insert(first).await.unwrap();

        let duplicate =
            WorkflowExecution::new(Uuid::now_v7(), Some("c-1".to_string()), HashMap::new());
        assert!(store.insert(duplicate).await.is_err());
    }

    #[tokio::test]
    async fn due_retry_query_filters_status_and_time() {
        let store = InMemoryTaskExecutionStore::new();
        let definition = TaskDefinition::new("fetch", "http", 0);

        let mut due = TaskExecution::new(Uuid::now_v7(), &definition, HashMap::new());
        due.status = TaskStatus::AwaitingRetry;
        due.next_retry_at = Some(Utc::now() - chrono::Duration::seconds(5));
        let due_id = due.id;
        store.insert(due).await.unwrap();

        let mut not_due = TaskExecution::new(Uuid::now_v7(), &definition, HashMap::new());
        not_due.status = TaskStatus::AwaitingRetry;
        not_due.next_retry_at = Some(Utc::now() + chrono::Duration::seconds(3600));
        store.insert(not_due).await.unwrap();

        let mut pending = TaskExecution::new(Uuid::now_v7(), &definition, HashMap::new());
        pending.status = TaskStatus::Pending;
        store.insert(pending).await.unwrap();

        let found = store.find_due_for_retry(Utc::now()).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, due_id);
    }

    #[tokio::test]
    async fn tasks_listed_in_creation_order() {
        let store = InMemoryTaskExecutionStore::new();
        let workflow_id = Uuid::now_v7();
        let definition = TaskDefinition::new("step", "noop", 0);
        for _ in 0..3 {
            store
                .insert(TaskExecution::new(workflow_id, &definition, HashMap::new()))
                .await
                .unwrap();
        }
        let listed = store.list_for_workflow(workflow_id).await.unwrap();
        assert_eq!(listed.len(), 3);
        assert!(listed.windows(2).all(|w| w[0].created_at <= w[1].created_at));
    }
}
