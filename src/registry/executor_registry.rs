use crate::error::{Result, WorkflowError};
use crate::executor::TaskExecutor;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

/// Thread-safe registry mapping task-type strings to executors.
#[derive(Default)]
pub struct TaskExecutorRegistry {
    executors: RwLock<HashMap<String, Arc<dyn TaskExecutor>>>,
}

impl TaskExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an executor under its declared task type, replacing any
    /// previous registration for that type.
    pub fn register(&self, executor: Arc<dyn TaskExecutor>) -> Result<()> {
        let task_type = executor.task_type().to_string();
        if task_type.is_empty() {
            return Err(WorkflowError::Validation(
                "executor task type must not be empty".to_string(),
            ));
        }

        let mut executors = self
            .executors
            .write()
            .map_err(|_| WorkflowError::Configuration("executor registry lock poisoned".to_string()))?;

        if executors.contains_key(&task_type) {
            warn!(task_type = %task_type, "executor already registered, replacing");
        } else {
            info!(task_type = %task_type, "registering task executor");
        }

        executors.insert(task_type, executor);
        Ok(())
    }

    /// Resolve the executor for a task type.
    pub fn resolve(&self, task_type: &str) -> Result<Arc<dyn TaskExecutor>> {
        let executors = self
            .executors
            .read()
            .map_err(|_| WorkflowError::Configuration("executor registry lock poisoned".to_string()))?;

        executors
            .get(task_type)
            .cloned()
            .ok_or_else(|| WorkflowError::NoExecutor(task_type.to_string()))
    }

    /// Task types currently registered, sorted for stable output.
    pub fn registered_types(&self) -> Vec<String> {
        let executors = match self.executors.read() {
            Ok(executors) => executors,
            Err(_) => return Vec::new(),
        };
        let mut types: Vec<String> = executors.keys().cloned().collect();
        types.sort();
        types
    }
}
