//! # Workflow Engine
//!
//! Single entry point for driving workflow executions. Resolves the
//! definition's strategy (falling back to sequential), awaits the
//! strategy's verdict and persists it, and converts uncaught drive
//! errors into failed workflows.

use crate::engine::strategy::ExecutionStrategy;
use crate::error::{Result, WorkflowError};
use crate::events::{EventPublisher, OrchestrationEvent, WorkflowEvent, WorkflowEventType};
use crate::models::{StrategyType, WorkflowExecution};
use crate::services::{TaskExecutionService, WorkflowExecutionService};
use crate::state_machine::WorkflowStatus;
use crate::storage::WorkflowDefinitionStore;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Core coordinator that drives workflow executions through strategies.
pub struct WorkflowEngine {
    workflow_service: Arc<WorkflowExecutionService>,
    task_service: Arc<TaskExecutionService>,
    definitions: Arc<dyn WorkflowDefinitionStore>,
    strategies: HashMap<StrategyType, Arc<dyn ExecutionStrategy>>,
    events: EventPublisher,
}

impl WorkflowEngine {
    pub fn new(
        workflow_service: Arc<WorkflowExecutionService>,
        task_service: Arc<TaskExecutionService>,
        definitions: Arc<dyn WorkflowDefinitionStore>,
        strategies: HashMap<StrategyType, Arc<dyn ExecutionStrategy>>,
        events: EventPublisher,
    ) -> Self {
        Self {
            workflow_service,
            task_service,
            definitions,
            strategies,
            events,
        }
    }

    /// Drive a workflow execution to its next rest point.
    ///
    /// Executions outside {Created, Running} are left untouched. Any
    /// error during the drive marks the workflow failed.
    pub async fn execute_workflow(&self, workflow_execution_id: Uuid) -> Result<()> {
        let workflow = self.workflow_service.get(workflow_execution_id).await?;

        if !workflow.status.is_executable() {
            info!(
                workflow_execution_id = %workflow_execution_id,
                status = %workflow.status,
                "workflow cannot be executed in its current state"
            );
            return Ok(());
        }

        if workflow.status == WorkflowStatus::Created {
            self.workflow_service
                .update_status(workflow_execution_id, WorkflowStatus::Running)
                .await?;
            self.publish_lifecycle_event(&workflow, WorkflowEventType::Started)
                .await;
        }

        match self.drive(workflow_execution_id).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.mark_failed(workflow_execution_id, &e).await;
                Err(e)
            }
        }
    }

    /// Reset a task and continue the workflow from its position.
    pub async fn restart_task(
        &self,
        workflow_execution_id: Uuid,
        task_execution_id: Uuid,
    ) -> Result<()> {
        let workflow = self.workflow_service.get(workflow_execution_id).await?;
        let mut task = self.task_service.get(task_execution_id).await?;

        if task.workflow_execution_id != workflow.id {
            return Err(WorkflowError::Validation(format!(
                "task {} does not belong to workflow {}",
                task.id, workflow.id
            )));
        }

        self.workflow_service
            .update_status(workflow_execution_id, WorkflowStatus::Running)
            .await?;

        task.reset_for_rerun();
        let task = self.task_service.save(task).await?;

        let definition = self.definitions.get(workflow.workflow_definition_id).await?;
        if let Some(index) = definition.task_index(task.task_definition_id) {
            let mut workflow = self.workflow_service.get(workflow_execution_id).await?;
            workflow.current_task_index = index;
            self.workflow_service.save(workflow).await?;
        }

        match self.drive(workflow_execution_id).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.mark_failed(workflow_execution_id, &e).await;
                Err(e)
            }
        }
    }

    /// Drive only the listed task definitions of a workflow.
    pub async fn execute_task_subset(
        &self,
        workflow_execution_id: Uuid,
        task_definition_ids: Vec<Uuid>,
    ) -> Result<()> {
        self.workflow_service
            .update_status(workflow_execution_id, WorkflowStatus::Running)
            .await?;

        let workflow = self.workflow_service.get(workflow_execution_id).await?;
        let strategy = self.resolve_strategy(&workflow).await?;

        match strategy.execute_subset(&workflow, task_definition_ids).await {
            Ok(status) => self.apply_verdict(workflow_execution_id, status).await,
            Err(e) => {
                self.mark_failed(workflow_execution_id, &e).await;
                Err(e)
            }
        }
    }

    /// Launch a detached drive on the runtime.
    pub fn spawn_execute(self: &Arc<Self>, workflow_execution_id: Uuid) {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = engine.execute_workflow(workflow_execution_id).await {
                error!(
                    workflow_execution_id = %workflow_execution_id,
                    error = %e,
                    "background workflow drive failed"
                );
            }
        });
    }

    async fn drive(&self, workflow_execution_id: Uuid) -> Result<()> {
        let workflow = self.workflow_service.get(workflow_execution_id).await?;
        let strategy = self.resolve_strategy(&workflow).await?;
        let status = strategy.execute(&workflow).await?;
        self.apply_verdict(workflow_execution_id, status).await
    }

    /// Persist the status a strategy reported and publish the matching
    /// lifecycle event.
    async fn apply_verdict(
        &self,
        workflow_execution_id: Uuid,
        status: WorkflowStatus,
    ) -> Result<()> {
        let current = self.workflow_service.get(workflow_execution_id).await?;
        if current.status.is_terminal() {
            // Cancelled (or otherwise settled) while the strategy ran;
            // the late verdict is discarded.
            info!(
                workflow_execution_id = %workflow_execution_id,
                status = %current.status,
                "discarding strategy verdict for settled workflow"
            );
            return Ok(());
        }

        let updated = self
            .workflow_service
            .update_status(workflow_execution_id, status)
            .await?;

        match status {
            WorkflowStatus::Completed => {
                self.publish_lifecycle_event(&updated, WorkflowEventType::Completed)
                    .await;
            }
            WorkflowStatus::Failed => {
                self.publish_lifecycle_event(&updated, WorkflowEventType::Failed)
                    .await;
            }
            _ => {}
        }

        Ok(())
    }

    async fn resolve_strategy(
        &self,
        workflow: &WorkflowExecution,
    ) -> Result<Arc<dyn ExecutionStrategy>> {
        let definition = self.definitions.get(workflow.workflow_definition_id).await?;

        if let Some(strategy) = self.strategies.get(&definition.strategy_type) {
            return Ok(Arc::clone(strategy));
        }

        warn!(
            strategy_type = %definition.strategy_type,
            "no execution strategy found for type, using sequential strategy"
        );

        self.strategies
            .get(&StrategyType::Sequential)
            .cloned()
            .ok_or_else(|| {
                WorkflowError::Configuration("no execution strategy available".to_string())
            })
    }

    async fn mark_failed(&self, workflow_execution_id: Uuid, error: &WorkflowError) {
        error!(
            workflow_execution_id = %workflow_execution_id,
            error = %error,
            "error executing workflow"
        );

        let result = async {
            let mut workflow = self.workflow_service.get(workflow_execution_id).await?;
            workflow.error_message = Some(error.to_string());
            self.workflow_service.save(workflow).await?;
            let updated = self
                .workflow_service
                .update_status(workflow_execution_id, WorkflowStatus::Failed)
                .await?;
            self.publish_lifecycle_event(&updated, WorkflowEventType::Failed)
                .await;
            Ok::<(), WorkflowError>(())
        }
        .await;

        if let Err(e) = result {
            // Nothing left to do beyond logging; the original error is
            // surfaced to the caller.
            error!(
                workflow_execution_id = %workflow_execution_id,
                error = %e,
                "failed to record workflow failure"
            );
        }
    }

    async fn publish_lifecycle_event(
        &self,
        workflow: &WorkflowExecution,
        event_type: WorkflowEventType,
    ) {
        let workflow_name = match self.definitions.get(workflow.workflow_definition_id).await {
            Ok(definition) => definition.name,
            Err(_) => String::new(),
        };

        let mut attributes = HashMap::new();
        if let Some(error) = &workflow.error_message {
            attributes.insert(
                "error_message".to_string(),
                serde_json::Value::String(error.clone()),
            );
        }

        self.events
            .publish(OrchestrationEvent::Workflow(WorkflowEvent {
                event_type,
                workflow_execution_id: workflow.id,
                workflow_name,
                correlation_id: workflow.correlation_id.clone(),
                occurred_at: Utc::now(),
                attributes,
            }));
    }
}
