//! # Orchestrator Assembly
//!
//! Wires stores, services, strategies, engine, scheduler and ingress into
//! one process-wide system. The default assembly uses the bundled
//! in-memory stores and queue; embedding applications can substitute
//! their own store and queue implementations.

use crate::config::OrchestratorConfig;
use crate::engine::{default_strategies, StrategyServices, WorkflowEngine};
use crate::error::Result;
use crate::events::EventPublisher;
use crate::messaging::{InMemoryTaskQueue, TaskMessageSender, TaskResultListener};
use crate::models::WorkflowDefinition;
use crate::registry::TaskExecutorRegistry;
use crate::retry::RetryPolicy;
use crate::scheduler::RetryScheduler;
use crate::services::{TaskExecutionService, UserReviewService, WorkflowExecutionService};
use crate::storage::{
    InMemoryReviewPointStore, InMemoryTaskExecutionStore, InMemoryWorkflowDefinitionStore,
    InMemoryWorkflowExecutionStore, ReviewPointStore, TaskExecutionStore,
    WorkflowDefinitionStore, WorkflowExecutionStore,
};
use std::sync::Arc;

/// Fully wired orchestration core.
pub struct Orchestrator {
    pub config: OrchestratorConfig,
    pub events: EventPublisher,
    pub registry: Arc<TaskExecutorRegistry>,
    pub definitions: Arc<dyn WorkflowDefinitionStore>,
    pub workflow_service: Arc<WorkflowExecutionService>,
    pub task_service: Arc<TaskExecutionService>,
    pub review_service: Arc<UserReviewService>,
    pub engine: Arc<WorkflowEngine>,
    pub scheduler: Arc<RetryScheduler>,
    pub result_listener: Arc<TaskResultListener>,
    pub task_queue: Arc<InMemoryTaskQueue>,
}

impl Orchestrator {
    /// Assemble a complete in-memory orchestrator from configuration.
    pub fn new(config: OrchestratorConfig) -> Self {
        let definitions: Arc<dyn WorkflowDefinitionStore> =
            Arc::new(InMemoryWorkflowDefinitionStore::new());
        let executions: Arc<dyn WorkflowExecutionStore> =
            Arc::new(InMemoryWorkflowExecutionStore::new());
        let tasks: Arc<dyn TaskExecutionStore> = Arc::new(InMemoryTaskExecutionStore::new());
        let review_points: Arc<dyn ReviewPointStore> = Arc::new(InMemoryReviewPointStore::new());

        let task_queue = Arc::new(InMemoryTaskQueue::new());
        let sender: Arc<dyn TaskMessageSender> = task_queue.clone();

        Self::with_stores(
            config,
            definitions,
            executions,
            tasks,
            review_points,
            sender,
            task_queue,
        )
    }

    /// Assemble from explicit stores and queue (custom backends).
    #[allow(clippy::too_many_arguments)]
    pub fn with_stores(
        config: OrchestratorConfig,
        definitions: Arc<dyn WorkflowDefinitionStore>,
        executions: Arc<dyn WorkflowExecutionStore>,
        tasks: Arc<dyn TaskExecutionStore>,
        review_points: Arc<dyn ReviewPointStore>,
        sender: Arc<dyn TaskMessageSender>,
        task_queue: Arc<InMemoryTaskQueue>,
    ) -> Self {
        let events = EventPublisher::with_config(1024, &config.events);
        let registry = Arc::new(TaskExecutorRegistry::new());
        let retry_policy = RetryPolicy::from_config(&config.retry);

        let task_service = Arc::new(TaskExecutionService::new(
            tasks.clone(),
            executions.clone(),
            definitions.clone(),
            review_points.clone(),
            registry.clone(),
            sender,
            events.clone(),
            retry_policy,
        ));

        let workflow_service = Arc::new(WorkflowExecutionService::new(
            executions,
            definitions.clone(),
            tasks,
            review_points.clone(),
            events.clone(),
        ));

        let strategy_services = StrategyServices {
            workflow_service: workflow_service.clone(),
            task_service: task_service.clone(),
            definitions: definitions.clone(),
            thread_pool_size: config.execution.thread_pool_size,
        };

        let engine = Arc::new(WorkflowEngine::new(
            workflow_service.clone(),
            task_service.clone(),
            definitions.clone(),
            default_strategies(strategy_services),
            events.clone(),
        ));
        workflow_service.attach_engine(&engine);

        let review_service = Arc::new(UserReviewService::new(
            workflow_service.clone(),
            task_service.clone(),
            engine.clone(),
            review_points,
            events.clone(),
        ));

        let scheduler = Arc::new(RetryScheduler::new(
            task_service.clone(),
            workflow_service.clone(),
            engine.clone(),
            config.scheduler.clone(),
            config.retention.clone(),
        ));

        let result_listener = Arc::new(TaskResultListener::new(
            task_service.clone(),
            workflow_service.clone(),
            engine.clone(),
        ));

        Self {
            config,
            events,
            registry,
            definitions,
            workflow_service,
            task_service,
            review_service,
            engine,
            scheduler,
            result_listener,
            task_queue,
        }
    }

    /// Register a workflow definition.
    pub async fn register_definition(
        &self,
        definition: WorkflowDefinition,
    ) -> Result<WorkflowDefinition> {
        self.definitions.insert(definition).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn assembly_wires_all_components() {
        let orchestrator = Orchestrator::new(OrchestratorConfig::default());
        assert_eq!(orchestrator.registry.registered_types().len(), 0);
        assert_eq!(orchestrator.events.subscriber_count(), 0);
    }
}
