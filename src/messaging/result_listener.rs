//! Async result ingress.
//!
//! Consumes task result messages from the result queue and settles the
//! corresponding task executions. Unknown ids (stale replays, deleted
//! workflows) are logged and dropped. Completing a queued task re-drives
//! its workflow when the workflow is still running.

use crate::engine::WorkflowEngine;
use crate::error::WorkflowError;
use crate::messaging::TaskResultMessage;
use crate::services::{TaskExecutionService, WorkflowExecutionService};
use crate::state_machine::WorkflowStatus;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Consumer for the task-result queue.
pub struct TaskResultListener {
    task_service: Arc<TaskExecutionService>,
    workflow_service: Arc<WorkflowExecutionService>,
    engine: Arc<WorkflowEngine>,
}

impl TaskResultListener {
    pub fn new(
        task_service: Arc<TaskExecutionService>,
        workflow_service: Arc<WorkflowExecutionService>,
        engine: Arc<WorkflowEngine>,
    ) -> Self {
        Self {
            task_service,
            workflow_service,
            engine,
        }
    }

    /// Drain the result queue until it closes.
    pub fn spawn(
        self: Arc<Self>,
        mut receiver: mpsc::UnboundedReceiver<TaskResultMessage>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(message) = receiver.recv().await {
                self.handle_result(message).await;
            }
            debug!("task result queue closed, listener stopping");
        })
    }

    /// Settle one task from its result message.
    pub async fn handle_result(&self, message: TaskResultMessage) {
        let task = match self.task_service.get(message.task_execution_id).await {
            Ok(task) => task,
            Err(WorkflowError::NotFound { .. }) => {
                warn!(
                    task_execution_id = %message.task_execution_id,
                    "dropping result for unknown task execution"
                );
                return;
            }
            Err(e) => {
                warn!(
                    task_execution_id = %message.task_execution_id,
                    error = %e,
                    "failed to load task for result message"
                );
                return;
            }
        };

        let settled = if let Some(error_message) = message.error_message {
            self.task_service.fail(task.id, error_message).await
        } else {
            self.task_service
                .complete(task.id, message.outputs.unwrap_or_default())
                .await
        };

        if let Err(e) = settled {
            warn!(
                task_execution_id = %task.id,
                error = %e,
                "failed to settle task from result message"
            );
            return;
        }

        // Continue the workflow if it is still being driven
        match self.workflow_service.get(task.workflow_execution_id).await {
            Ok(workflow) if workflow.status == WorkflowStatus::Running => {
                if let Err(e) = self.engine.execute_workflow(workflow.id).await {
                    warn!(
                        workflow_execution_id = %workflow.id,
                        error = %e,
                        "workflow re-drive after async result failed"
                    );
                }
            }
            Ok(_) => {}
            Err(e) => warn!(
                workflow_execution_id = %task.workflow_execution_id,
                error = %e,
                "failed to load workflow after async result"
            ),
        }
    }
}
