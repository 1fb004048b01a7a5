use crate::config::{EventLogLevel, EventsConfig};
use crate::events::types::OrchestrationEvent;
use tokio::sync::broadcast;
use tracing::{debug, error, info, trace, warn};

/// Fire-and-forget publisher for lifecycle events.
///
/// Built on a broadcast channel: publishing with zero subscribers is not
/// an error, and slow subscribers lag instead of blocking publishers.
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<OrchestrationEvent>,
    enabled: bool,
    log_level: EventLogLevel,
}

/// Error types for event publishing
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("event channel is closed")]
    ChannelClosed,
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EventPublisher {
    /// Create a publisher with the specified channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            enabled: true,
            log_level: EventLogLevel::Info,
        }
    }

    /// Create a publisher honoring the event configuration section.
    pub fn with_config(capacity: usize, config: &EventsConfig) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            enabled: config.enabled,
            log_level: config.log_level,
        }
    }

    /// Publish an event to all current subscribers.
    ///
    /// A disabled publisher drops events silently; an empty subscriber
    /// set is not an error.
    pub fn publish(&self, event: OrchestrationEvent) {
        if !self.enabled {
            return;
        }

        self.log_event(&event);

        // send() errors only when there are no receivers, which is an
        // acceptable outcome for fire-and-forget notification
        let _ = self.sender.send(event);
    }

    /// Subscribe to events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<OrchestrationEvent> {
        self.sender.subscribe()
    }

    /// Number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    fn log_event(&self, event: &OrchestrationEvent) {
        let description = event.describe();
        match self.log_level {
            EventLogLevel::Trace => trace!(event = %description, "lifecycle event"),
            EventLogLevel::Debug => debug!(event = %description, "lifecycle event"),
            EventLogLevel::Info => info!(event = %description, "lifecycle event"),
            EventLogLevel::Warn => warn!(event = %description, "lifecycle event"),
            EventLogLevel::Error => error!(event = %description, "lifecycle event"),
        }
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::types::{WorkflowEvent, WorkflowEventType};
    use chrono::Utc;
    use std::collections::HashMap;
    use uuid::Uuid;

    fn workflow_event(event_type: WorkflowEventType) -> OrchestrationEvent {
        OrchestrationEvent::Workflow(WorkflowEvent {
            event_type,
            workflow_execution_id: Uuid::now_v7(),
            workflow_name: "flow".to_string(),
            correlation_id: "c-1".to_string(),
            occurred_at: Utc::now(),
            attributes: HashMap::new(),
        })
    }

    #[test]
    fn publish_without_subscribers_is_ok() {
        let publisher = EventPublisher::default();
        publisher.publish(workflow_event(WorkflowEventType::Created));
    }

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let publisher = EventPublisher::default();
        let mut receiver = publisher.subscribe();

        publisher.publish(workflow_event(WorkflowEventType::Started));

        let received = receiver.recv().await.unwrap();
        match received {
            OrchestrationEvent::Workflow(e) => {
                assert_eq!(e.event_type, WorkflowEventType::Started)
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn disabled_publisher_drops_events() {
        let config = EventsConfig {
            enabled: false,
            log_level: EventLogLevel::Info,
        };
        let publisher = EventPublisher::with_config(8, &config);
        let mut receiver = publisher.subscribe();

        publisher.publish(workflow_event(WorkflowEventType::Started));

        assert!(matches!(
            receiver.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }
}
