//! Queue publishing boundary and the bundled in-memory queue.

use crate::messaging::message::{TaskDispatchMessage, TASK_DISPATCH_QUEUE};
use crate::messaging::MessagingError;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::sync::Mutex;
use tracing::debug;

/// Publisher side of the task-dispatch queue.
#[async_trait]
pub trait TaskMessageSender: Send + Sync {
    /// Publish a dispatch message for asynchronous execution.
    async fn send_task_message(
        &self,
        message: TaskDispatchMessage,
    ) -> Result<(), MessagingError>;
}

/// Channel-backed task queue for embedded deployments and tests.
///
/// The dispatch side implements [`TaskMessageSender`]; a worker drains
/// messages through [`InMemoryTaskQueue::take_receiver`].
pub struct InMemoryTaskQueue {
    sender: mpsc::UnboundedSender<TaskDispatchMessage>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<TaskDispatchMessage>>>,
}

impl InMemoryTaskQueue {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Mutex::new(Some(receiver)),
        }
    }

    /// Take the consumer end of the queue. Yields `None` after the first
    /// call; there is exactly one consumer.
    pub async fn take_receiver(&self) -> Option<mpsc::UnboundedReceiver<TaskDispatchMessage>> {
        self.receiver.lock().await.take()
    }
}

impl Default for InMemoryTaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskMessageSender for InMemoryTaskQueue {
    async fn send_task_message(
        &self,
        message: TaskDispatchMessage,
    ) -> Result<(), MessagingError> {
        debug!(
            task_execution_id = %message.task_execution_id,
            task_type = %message.task_type,
            "publishing task dispatch message"
        );
        self.sender
            .send(message)
            .map_err(|e| MessagingError::PublishFailed {
                queue: TASK_DISPATCH_QUEUE.to_string(),
                reason: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use uuid::Uuid;

    #[tokio::test]
    async fn published_messages_reach_the_consumer() {
        let queue = InMemoryTaskQueue::new();
        let mut receiver = queue.take_receiver().await.unwrap();

        let message = TaskDispatchMessage {
            task_execution_id: Uuid::now_v7(),
            task_type: "http".to_string(),
            inputs: HashMap::new(),
            configuration: HashMap::new(),
        };
        queue.send_task_message(message.clone()).await.unwrap();

        let received = receiver.recv().await.unwrap();
        assert_eq!(received.task_execution_id, message.task_execution_id);
    }

    #[tokio::test]
    async fn receiver_can_only_be_taken_once() {
        let queue = InMemoryTaskQueue::new();
        assert!(queue.take_receiver().await.is_some());
        assert!(queue.take_receiver().await.is_none());
    }
}
