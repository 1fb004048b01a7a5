//! Message structures for the task queues.
//!
//! Queue names and message shapes are external contracts shared with
//! out-of-process workers.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Name of the queue carrying outbound task dispatches.
pub const TASK_DISPATCH_QUEUE: &str = "workflow.task.dispatch";

/// Name of the queue carrying inbound task results.
pub const TASK_RESULT_QUEUE: &str = "workflow.task.result";

/// Outbound message asking a worker to run one task attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDispatchMessage {
    pub task_execution_id: Uuid,
    /// Executor selector on the worker side
    pub task_type: String,
    /// Variable-substituted inputs for this attempt
    pub inputs: HashMap<String, String>,
    /// Raw task configuration
    pub configuration: HashMap<String, String>,
}

/// Inbound message reporting the outcome of a queued task attempt.
///
/// Exactly one of `outputs` / `error_message` is expected; a message with
/// neither is treated as a success with empty outputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResultMessage {
    pub task_execution_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl TaskResultMessage {
    /// Build a success result.
    pub fn success(task_execution_id: Uuid, outputs: HashMap<String, String>) -> Self {
        Self {
            task_execution_id,
            outputs: Some(outputs),
            error_message: None,
        }
    }

    /// Build a failure result.
    pub fn failure(task_execution_id: Uuid, error_message: impl Into<String>) -> Self {
        Self {
            task_execution_id,
            outputs: None,
            error_message: Some(error_message.into()),
        }
    }

    /// A result is a failure exactly when it carries an error message.
    pub fn is_failure(&self) -> bool {
        self.error_message.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_message_serde_round_trip() {
        let message = TaskResultMessage::failure(Uuid::now_v7(), "connection reset");
        let json = serde_json::to_string(&message).unwrap();
        assert!(!json.contains("outputs"));
        let parsed: TaskResultMessage = serde_json::from_str(&json).unwrap();
        assert!(parsed.is_failure());
        assert_eq!(parsed.error_message.as_deref(), Some("connection reset"));
    }

    #[test]
    fn dispatch_message_carries_inputs_and_configuration() {
        let message = TaskDispatchMessage {
            task_execution_id: Uuid::now_v7(),
            task_type: "http".to_string(),
            inputs: HashMap::from([("url".to_string(), "https://example.com".to_string())]),
            configuration: HashMap::from([("method".to_string(), "GET".to_string())]),
        };
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["task_type"], "http");
        assert_eq!(json["inputs"]["url"], "https://example.com");
    }
}
