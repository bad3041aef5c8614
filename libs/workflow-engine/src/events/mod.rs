//! Published events (§7: `WorkflowInstanceFailedEvent`, `…Completed|Failed`,
//! `…ApprovalCompleted`) and the `Publisher` contract they go out through
//! (§6: "fire-and-forget; failure logged not propagated").

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use strata_domain::ids::InstanceId;

/// The envelope every published event is wrapped in (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    pub id: String,
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub event_time: DateTime<Utc>,
    pub data: Value,
    pub data_version: String,
}

impl EventEnvelope {
    #[must_use]
    pub fn new(event_type: impl Into<String>, subject: Option<String>, data: Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            event_type: event_type.into(),
            subject,
            event_time: Utc::now(),
            data,
            data_version: "1.0".to_string(),
        }
    }
}

/// The handful of instance/approval lifecycle notifications the orchestrator
/// and approval sub-machine emit (§7 "user-visible behavior").
#[derive(Debug, Clone)]
pub enum WorkflowEvent {
    InstanceCompleted { instance_id: InstanceId },
    InstanceFailed { instance_id: InstanceId, error: Value },
    InstanceTimedOut { instance_id: InstanceId },
    InstanceCancelled { instance_id: InstanceId },
    ApprovalCompleted { instance_id: InstanceId, approval_id: String, status: String },
}

impl WorkflowEvent {
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::InstanceCompleted { .. } => "WorkflowInstanceCompletedEvent",
            Self::InstanceFailed { .. } => "WorkflowInstanceFailedEvent",
            Self::InstanceTimedOut { .. } => "WorkflowInstanceTimedOutEvent",
            Self::InstanceCancelled { .. } => "WorkflowInstanceCancelledEvent",
            Self::ApprovalCompleted { .. } => "WorkflowApprovalCompletedEvent",
        }
    }

    #[must_use]
    pub fn to_envelope(&self) -> EventEnvelope {
        let data = match self {
            Self::InstanceCompleted { instance_id } => {
                serde_json::json!({ "instanceId": instance_id.to_string() })
            }
            Self::InstanceFailed { instance_id, error } => {
                serde_json::json!({ "instanceId": instance_id.to_string(), "error": error })
            }
            Self::InstanceTimedOut { instance_id } => {
                serde_json::json!({ "instanceId": instance_id.to_string() })
            }
            Self::InstanceCancelled { instance_id } => {
                serde_json::json!({ "instanceId": instance_id.to_string() })
            }
            Self::ApprovalCompleted { instance_id, approval_id, status } => {
                serde_json::json!({
                    "instanceId": instance_id.to_string(),
                    "approvalId": approval_id,
                    "status": status,
                })
            }
        };
        EventEnvelope::new(self.event_type(), None, data)
    }
}

/// `publish(event)` (§6): fire-and-forget, failure logged not propagated.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, envelope: EventEnvelope);
}

/// Publisher that only logs. A stand-in for the real event-bus publisher,
/// which is an external collaborator (§1).
#[derive(Debug, Default)]
pub struct LoggingPublisher;

#[async_trait]
impl Publisher for LoggingPublisher {
    async fn publish(&self, envelope: EventEnvelope) {
        tracing::info!(
            event_type = %envelope.event_type,
            event_id = %envelope.id,
            "publishing event"
        );
    }
}

#[must_use]
pub fn logging_publisher() -> Arc<dyn Publisher> {
    Arc::new(LoggingPublisher)
}

/// Publish a [`WorkflowEvent`], swallowing and logging any error as the
/// spec requires. `Publisher::publish` itself can't fail, so this exists to
/// give the orchestrator a single call site and future place to add retry.
pub async fn publish_workflow_event(publisher: &Arc<dyn Publisher>, event: &WorkflowEvent) {
    publisher.publish(event.to_envelope()).await;
}
