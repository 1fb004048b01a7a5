//! # User Review Service
//!
//! Human-in-the-loop surface: creates review points (suspending their
//! workflow), processes decisions and re-enters the engine.

use crate::engine::WorkflowEngine;
use crate::error::{Result, WorkflowError};
use crate::events::{EventPublisher, OrchestrationEvent, UserReviewEvent, UserReviewEventType};
use crate::models::{ReviewDecision, UserReviewPoint, WorkflowExecution};
use crate::services::{TaskExecutionService, WorkflowExecutionService};
use crate::state_machine::WorkflowStatus;
use crate::storage::ReviewPointStore;
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Service managing user review points and decisions.
pub struct UserReviewService {
    workflow_service: Arc<WorkflowExecutionService>,
    task_service: Arc<TaskExecutionService>,
    engine: Arc<WorkflowEngine>,
    review_points: Arc<dyn ReviewPointStore>,
    events: EventPublisher,
}

impl UserReviewService {
    pub fn new(
        workflow_service: Arc<WorkflowExecutionService>,
        task_service: Arc<TaskExecutionService>,
        engine: Arc<WorkflowEngine>,
        review_points: Arc<dyn ReviewPointStore>,
        events: EventPublisher,
    ) -> Self {
        Self {
            workflow_service,
            task_service,
            engine,
            review_points,
            events,
        }
    }

    /// Create a review point for a task and move its workflow to
    /// `AwaitingUserReview`.
    pub async fn create_review_point(&self, task_execution_id: Uuid) -> Result<UserReviewPoint> {
        let task = self.task_service.get(task_execution_id).await?;
        self.workflow_service
            .update_status(task.workflow_execution_id, WorkflowStatus::AwaitingUserReview)
            .await?;
        self.task_service.create_review_point(task_execution_id).await
    }

    /// Process a review decision and resume the workflow accordingly.
    pub async fn submit_review(
        &self,
        review_point_id: Uuid,
        decision: ReviewDecision,
        reviewer: &str,
        comment: Option<String>,
    ) -> Result<WorkflowExecution> {
        let mut point = self.review_points.get(review_point_id).await?;
        if !point.is_open() {
            return Err(WorkflowError::Validation(format!(
                "review point {review_point_id} has already been decided"
            )));
        }

        point.reviewed_at = Some(Utc::now());
        point.reviewer = Some(reviewer.to_string());
        point.comment = comment;
        point.decision = Some(decision);
        let point = self.review_points.update(point).await?;

        info!(
            review_point_id = %point.id,
            decision = %decision,
            reviewer = %reviewer,
            "processing user review decision"
        );

        let task = self.task_service.get(point.task_execution_id).await?;
        let workflow_execution_id = task.workflow_execution_id;

        match decision {
            ReviewDecision::Approve => {
                self.task_service
                    .complete(task.id, task.outputs.clone())
                    .await?;
                self.workflow_service
                    .update_status(workflow_execution_id, WorkflowStatus::Running)
                    .await?;
                self.engine.execute_workflow(workflow_execution_id).await?;
            }
            ReviewDecision::Reject => {
                self.task_service
                    .fail(task.id, format!("Rejected by user: {reviewer}"))
                    .await?;
                self.workflow_service
                    .update_status(workflow_execution_id, WorkflowStatus::Running)
                    .await?;
                self.engine.execute_workflow(workflow_execution_id).await?;
            }
            ReviewDecision::Restart => {
                self.workflow_service
                    .update_status(workflow_execution_id, WorkflowStatus::Running)
                    .await?;
                self.engine
                    .restart_task(workflow_execution_id, task.id)
                    .await?;
            }
        }

        let workflow = self.workflow_service.get(workflow_execution_id).await?;
        self.publish_review_completed(&point, decision, &workflow.correlation_id);
        Ok(workflow)
    }

    /// Open review points across all workflows awaiting review.
    pub async fn pending_reviews(&self) -> Result<Vec<UserReviewPoint>> {
        let workflows = self
            .workflow_service
            .list_by_status(WorkflowStatus::AwaitingUserReview)
            .await?;

        let mut pending = Vec::new();
        for workflow in workflows {
            let points = self.review_points.list_for_workflow(workflow.id).await?;
            pending.extend(points.into_iter().filter(|p| p.is_open()));
        }
        Ok(pending)
    }

    fn publish_review_completed(
        &self,
        point: &UserReviewPoint,
        decision: ReviewDecision,
        correlation_id: &str,
    ) {
        let mut attributes = HashMap::new();
        attributes.insert(
            "decision".to_string(),
            Value::String(decision.to_string()),
        );
        if let Some(reviewer) = &point.reviewer {
            attributes.insert("reviewer".to_string(), Value::String(reviewer.clone()));
        }

        self.events
            .publish(OrchestrationEvent::UserReview(UserReviewEvent {
                event_type: UserReviewEventType::Completed,
                workflow_execution_id: point.workflow_execution_id,
                task_execution_id: point.task_execution_id,
                review_point_id: point.id,
                correlation_id: correlation_id.to_string(),
                occurred_at: Utc::now(),
                attributes,
            }));
    }
}
