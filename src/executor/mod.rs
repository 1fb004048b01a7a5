//! # Task Executor Contract
//!
//! Executors are string-keyed capabilities resolved through the registry.
//! Each executor declares its task type and turns a task definition plus
//! execution context into a result map. Shared concerns (required-config
//! validation, `${var}` substitution, result post-processing) live in
//! [`support`] and are composed into executors rather than inherited.

pub mod support;

use crate::context::ExecutionContext;
use crate::models::TaskDefinition;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

/// Failures raised by task executors.
///
/// Configuration errors are terminal: the task fails regardless of its
/// remaining retry budget. Every other failure is retriable.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExecutorError {
    /// Missing or malformed task configuration; never retried
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Transient failure (network, upstream, timeout); retried until the
    /// retry limit is exhausted
    #[error("execution failed: {0}")]
    Retriable(String),
}

impl ExecutorError {
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Retriable(_))
    }
}

/// Result map produced by an executor run.
///
/// Conventional keys: `success` (bool) plus executor-specific fields;
/// [`support::finalize_result`] stamps `execution_timestamp`.
pub type ExecutorResult = HashMap<String, Value>;

/// A task executor capability, registered by task type.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Task type string this executor serves (registry key).
    fn task_type(&self) -> &str;

    /// Run one task attempt against the execution context.
    async fn execute(
        &self,
        definition: &TaskDefinition,
        context: &mut ExecutionContext,
    ) -> Result<ExecutorResult, ExecutorError>;
}

impl std::fmt::Debug for dyn TaskExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskExecutor")
            .field("task_type", &self.task_type())
            .finish()
    }
}
