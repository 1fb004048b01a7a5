//! # Task Queue Messaging
//!
//! Message shapes and the queue boundary for queued task execution.
//! Dispatch messages leave through a [`TaskMessageSender`]; results come
//! back through the [`result_listener`] ingress. The broker itself is an
//! external collaborator; an in-memory channel-backed queue is bundled
//! for embedded use and tests.

pub mod message;
pub mod queue;
pub mod result_listener;

pub use message::{TaskDispatchMessage, TaskResultMessage, TASK_DISPATCH_QUEUE, TASK_RESULT_QUEUE};
pub use queue::{InMemoryTaskQueue, TaskMessageSender};
pub use result_listener::TaskResultListener;

/// Errors raised at the queue boundary.
#[derive(Debug, Clone, thiserror::Error)]
pub enum MessagingError {
    #[error("failed to publish to queue '{queue}': {reason}")]
    PublishFailed { queue: String, reason: String },

    #[error("malformed message: {0}")]
    MalformedMessage(String),
}
