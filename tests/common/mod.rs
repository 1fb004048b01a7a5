//! Shared harness for the engine integration tests: stub executors,
//! definition builders and event collection.

#![allow(dead_code)]

use async_trait::async_trait;
use flowline_core::config::OrchestratorConfig;
use flowline_core::context::ExecutionContext;
use flowline_core::events::OrchestrationEvent;
use flowline_core::executor::{support, ExecutorError, ExecutorResult, TaskExecutor};
use flowline_core::models::TaskDefinition;
use flowline_core::Orchestrator;
use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Stub HTTP executor: validates config, substitutes variables and
/// reports a successful 200 response.
pub struct StubHttpExecutor;

#[async_trait]
impl TaskExecutor for StubHttpExecutor {
    fn task_type(&self) -> &str {
        "http"
    }

    async fn execute(
        &self,
        definition: &TaskDefinition,
        context: &mut ExecutionContext,
    ) -> Result<ExecutorResult, ExecutorError> {
        support::require_config(definition, &["url", "method"])?;
        let config = support::resolve_configuration(definition, context);
        let url = support::required_value(&config, "url")?;

        let mut result = ExecutorResult::new();
        result.insert("success".to_string(), json!(true));
        result.insert("status_code".to_string(), json!(200));
        result.insert("url".to_string(), json!(url));
        Ok(support::finalize_result(result))
    }
}

/// Executor that fails a fixed number of times before succeeding.
pub struct FlakyExecutor {
    calls: Arc<AtomicU32>,
    failures: u32,
}

impl FlakyExecutor {
    pub fn new(failures: u32) -> (Self, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        (
            Self {
                calls: calls.clone(),
                failures,
            },
            calls,
        )
    }
}

#[async_trait]
impl TaskExecutor for FlakyExecutor {
    fn task_type(&self) -> &str {
        "flaky"
    }

    async fn execute(
        &self,
        _definition: &TaskDefinition,
        _context: &mut ExecutionContext,
    ) -> Result<ExecutorResult, ExecutorError> {
        let attempt = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt <= self.failures {
            return Err(ExecutorError::Retriable("boom".to_string()));
        }
        let mut result = ExecutorResult::new();
        result.insert("success".to_string(), json!(true));
        result.insert("attempt".to_string(), json!(attempt));
        Ok(result)
    }
}

/// Executor that always fails.
pub struct DoomedExecutor;

#[async_trait]
impl TaskExecutor for DoomedExecutor {
    fn task_type(&self) -> &str {
        "doomed"
    }

    async fn execute(
        &self,
        _definition: &TaskDefinition,
        _context: &mut ExecutionContext,
    ) -> Result<ExecutorResult, ExecutorError> {
        Err(ExecutorError::Retriable("boom".to_string()))
    }
}

/// Executor that counts invocations and always succeeds.
pub struct CountingExecutor {
    calls: Arc<AtomicU32>,
}

impl CountingExecutor {
    pub fn new() -> (Self, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        (
            Self {
                calls: calls.clone(),
            },
            calls,
        )
    }
}

#[async_trait]
impl TaskExecutor for CountingExecutor {
    fn task_type(&self) -> &str {
        "counted"
    }

    async fn execute(
        &self,
        _definition: &TaskDefinition,
        _context: &mut ExecutionContext,
    ) -> Result<ExecutorResult, ExecutorError> {
        let attempt = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let mut result = ExecutorResult::new();
        result.insert("success".to_string(), json!(true));
        result.insert("attempt".to_string(), json!(attempt));
        Ok(result)
    }
}

/// Orchestrator with near-immediate retry delays for scheduler tests.
pub fn fast_retry_orchestrator() -> Orchestrator {
    let mut config = OrchestratorConfig::default();
    config.retry.initial_interval_ms = 1;
    config.retry.multiplier = 1.0;
    config.retry.max_interval_ms = 2;
    Orchestrator::new(config)
}

/// HTTP task definition with a url/method configuration.
pub fn http_task(name: &str, order: i32) -> TaskDefinition {
    let mut task = TaskDefinition::new(name, "http", order);
    task.configuration
        .insert("url".to_string(), "https://example.com/api".to_string());
    task.configuration
        .insert("method".to_string(), "GET".to_string());
    task
}

/// Collect every event published so far.
pub fn drain_events(
    receiver: &mut broadcast::Receiver<OrchestrationEvent>,
) -> Vec<OrchestrationEvent> {
    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }
    events
}

/// Let retry due times pass before a scheduler tick.
pub async fn let_retries_come_due() {
    tokio::time::sleep(std::time::Duration::from_millis(25)).await;
}
