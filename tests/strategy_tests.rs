//! Strategy behavior: conditional gating, parallel aggregation and
//! subset execution.

mod common;

use common::*;
use flowline_core::config::OrchestratorConfig;
use flowline_core::models::{StrategyType, TaskDefinition, WorkflowDefinition};
use flowline_core::state_machine::{TaskStatus, WorkflowStatus};
use flowline_core::Orchestrator;
use std::collections::HashMap;
use std::sync::Arc;

#[tokio::test]
async fn conditional_strategy_skips_false_branches() {
    let orchestrator = Orchestrator::new(OrchestratorConfig::default());
    orchestrator
        .registry
        .register(Arc::new(StubHttpExecutor))
        .unwrap();

    let mut eu_task = http_task("eu-handler", 0);
    eu_task.conditional_expression = Some("region == 'eu'".to_string());
    let mut us_task = http_task("us-handler", 1);
    us_task.conditional_expression = Some("region == 'us'".to_string());
    let unconditional = http_task("always", 2);

    let definition = WorkflowDefinition::new(
        "routed",
        "1.0.0",
        StrategyType::Conditional,
        vec![eu_task, us_task, unconditional],
    );
    orchestrator.register_definition(definition).await.unwrap();

    let variables = HashMap::from([("region".to_string(), "eu".to_string())]);
    let workflow = orchestrator
        .workflow_service
        .start_workflow("routed", "1.0.0", variables, None)
        .await
        .unwrap();
    orchestrator.engine.execute_workflow(workflow.id).await.unwrap();

    let workflow = orchestrator.workflow_service.get(workflow.id).await.unwrap();
    assert_eq!(workflow.status, WorkflowStatus::Completed);

    let tasks = orchestrator
        .task_service
        .list_for_workflow(workflow.id)
        .await
        .unwrap();
    assert_eq!(tasks.len(), 3);
    assert_eq!(tasks[0].status, TaskStatus::Completed);
    assert_eq!(tasks[1].status, TaskStatus::Skipped);
    assert_eq!(tasks[2].status, TaskStatus::Completed);
}

#[tokio::test]
async fn conditional_branching_follows_success_target() {
    let orchestrator = Orchestrator::new(OrchestratorConfig::default());
    orchestrator
        .registry
        .register(Arc::new(StubHttpExecutor))
        .unwrap();

    // First task jumps straight to the third on success
    let finish = http_task("finish", 2);
    let skipped_over = http_task("skipped-over", 1);
    let mut entry = http_task("entry", 0);
    entry.next_task_on_success = Some(finish.id);

    let definition = WorkflowDefinition::new(
        "jumping",
        "1.0.0",
        StrategyType::Conditional,
        vec![entry, skipped_over, finish],
    );
    orchestrator.register_definition(definition).await.unwrap();

    let workflow = orchestrator
        .workflow_service
        .start_workflow("jumping", "1.0.0", HashMap::new(), None)
        .await
        .unwrap();
    orchestrator.engine.execute_workflow(workflow.id).await.unwrap();

    let workflow = orchestrator.workflow_service.get(workflow.id).await.unwrap();
    assert_eq!(workflow.status, WorkflowStatus::Completed);

    let tasks = orchestrator
        .task_service
        .list_for_workflow(workflow.id)
        .await
        .unwrap();
    // The middle task was never materialized
    assert_eq!(tasks.len(), 2);
    assert!(tasks.iter().all(|t| t.status == TaskStatus::Completed));
}

#[tokio::test]
async fn parallel_strategy_completes_when_all_tasks_succeed() {
    let orchestrator = Orchestrator::new(OrchestratorConfig::default());
    orchestrator
        .registry
        .register(Arc::new(StubHttpExecutor))
        .unwrap();

    let definition = WorkflowDefinition::new(
        "fan-out",
        "1.0.0",
        StrategyType::Parallel,
        vec![
            http_task("shard-a", 0),
            http_task("shard-b", 1),
            http_task("shard-c", 2),
        ],
    );
    orchestrator.register_definition(definition).await.unwrap();

    let workflow = orchestrator
        .workflow_service
        .start_workflow("fan-out", "1.0.0", HashMap::new(), None)
        .await
        .unwrap();
    orchestrator.engine.execute_workflow(workflow.id).await.unwrap();

    let workflow = orchestrator.workflow_service.get(workflow.id).await.unwrap();
    assert_eq!(workflow.status, WorkflowStatus::Completed);

    let tasks = orchestrator
        .task_service
        .list_for_workflow(workflow.id)
        .await
        .unwrap();
    assert_eq!(tasks.len(), 3);
    assert!(tasks.iter().all(|t| t.status == TaskStatus::Completed));
}

#[tokio::test]
async fn parallel_strategy_fails_when_any_task_exhausts_retries() {
    let orchestrator = Orchestrator::new(OrchestratorConfig::default());
    orchestrator
        .registry
        .register(Arc::new(StubHttpExecutor))
        .unwrap();
    orchestrator
        .registry
        .register(Arc::new(DoomedExecutor))
        .unwrap();

    let mut failing = TaskDefinition::new("broken-shard", "doomed", 1);
    failing.retry_limit = 0;

    let definition = WorkflowDefinition::new(
        "fan-out-failure",
        "1.0.0",
        StrategyType::Parallel,
        vec![http_task("shard-a", 0), failing],
    );
    orchestrator.register_definition(definition).await.unwrap();

    let workflow = orchestrator
        .workflow_service
        .start_workflow("fan-out-failure", "1.0.0", HashMap::new(), None)
        .await
        .unwrap();
    orchestrator.engine.execute_workflow(workflow.id).await.unwrap();

    let workflow = orchestrator.workflow_service.get(workflow.id).await.unwrap();
    assert_eq!(workflow.status, WorkflowStatus::Failed);
    assert!(workflow.error_message.is_some());

    let tasks = orchestrator
        .task_service
        .list_for_workflow(workflow.id)
        .await
        .unwrap();
    let statuses: Vec<TaskStatus> = tasks.iter().map(|t| t.status).collect();
    assert!(statuses.contains(&TaskStatus::Completed));
    assert!(statuses.contains(&TaskStatus::Failed));
}

#[tokio::test]
async fn subset_execution_reruns_only_chosen_tasks() {
    let orchestrator = Orchestrator::new(OrchestratorConfig::default());
    let (flaky, calls) = FlakyExecutor::new(1);
    orchestrator.registry.register(Arc::new(flaky)).unwrap();
    orchestrator
        .registry
        .register(Arc::new(StubHttpExecutor))
        .unwrap();

    let mut brittle = TaskDefinition::new("brittle", "flaky", 0);
    brittle.retry_limit = 0;
    let brittle_id = brittle.id;
    let steady = http_task("steady", 1);

    let definition = WorkflowDefinition::new(
        "partial-rerun",
        "1.0.0",
        StrategyType::Sequential,
        vec![brittle, steady],
    );
    orchestrator.register_definition(definition).await.unwrap();

    let workflow = orchestrator
        .workflow_service
        .start_workflow("partial-rerun", "1.0.0", HashMap::new(), None)
        .await
        .unwrap();
    orchestrator.engine.execute_workflow(workflow.id).await.unwrap();

    let failed = orchestrator.workflow_service.get(workflow.id).await.unwrap();
    assert_eq!(failed.status, WorkflowStatus::Failed);
    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);

    // Re-execute only the brittle task; the second attempt succeeds
    let workflow = orchestrator
        .workflow_service
        .retry_subset(workflow.id, vec![brittle_id])
        .await
        .unwrap();

    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 2);
    assert_eq!(workflow.status, WorkflowStatus::Completed);
    assert_eq!(workflow.retry_count, 1);

    // The task record was reused, not replaced, and kept its own count
    let tasks = orchestrator
        .task_service
        .list_for_workflow(workflow.id)
        .await
        .unwrap();
    let brittle_runs: Vec<_> = tasks
        .iter()
        .filter(|t| t.task_definition_id == brittle_id)
        .collect();
    assert_eq!(brittle_runs.len(), 1);
    assert_eq!(brittle_runs[0].status, TaskStatus::Completed);
    assert_eq!(brittle_runs[0].retry_count, 0);
}

#[tokio::test]
async fn empty_subset_completes_immediately() {
    let orchestrator = Orchestrator::new(OrchestratorConfig::default());
    orchestrator
        .registry
        .register(Arc::new(DoomedExecutor))
        .unwrap();

    let mut broken = TaskDefinition::new("broken", "doomed", 0);
    broken.retry_limit = 0;
    let definition = WorkflowDefinition::new(
        "nothing-to-do",
        "1.0.0",
        StrategyType::Sequential,
        vec![broken],
    );
    orchestrator.register_definition(definition).await.unwrap();

    let workflow = orchestrator
        .workflow_service
        .start_workflow("nothing-to-do", "1.0.0", HashMap::new(), None)
        .await
        .unwrap();
    orchestrator.engine.execute_workflow(workflow.id).await.unwrap();

    let failed = orchestrator.workflow_service.get(workflow.id).await.unwrap();
    assert_eq!(failed.status, WorkflowStatus::Failed);

    // An empty subset retry finishes without driving any task
    let workflow = orchestrator
        .workflow_service
        .retry_subset(workflow.id, Vec::new())
        .await
        .unwrap();
    assert_eq!(workflow.status, WorkflowStatus::Completed);
}

#[tokio::test]
async fn empty_definition_completes_without_tasks() {
    let orchestrator = Orchestrator::new(OrchestratorConfig::default());

    let definition =
        WorkflowDefinition::new("empty", "1.0.0", StrategyType::Sequential, Vec::new());
    orchestrator.register_definition(definition).await.unwrap();

    let workflow = orchestrator
        .workflow_service
        .start_workflow("empty", "1.0.0", HashMap::new(), None)
        .await
        .unwrap();
    orchestrator.engine.execute_workflow(workflow.id).await.unwrap();

    let workflow = orchestrator.workflow_service.get(workflow.id).await.unwrap();
    assert_eq!(workflow.status, WorkflowStatus::Completed);
}
