//! `WorkflowInstance` and `StepExecution` (§3): one live or historical
//! execution of one definition version.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::common::{ActivityLogEntry, ErrorInfo};
use crate::ids::{InstanceId, OrganizationId, TriggerId, WorkflowId};
use crate::trigger::TriggerType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Pending,
    Running,
    Waiting,
    Paused,
    Completed,
    Failed,
    Cancelled,
    TimedOut,
}

impl InstanceStatus {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Cancelled | Self::TimedOut
        )
    }

    /// State machine of §4.7: is `self -> next` a legal instance transition?
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        use InstanceStatus::{Cancelled, Completed, Failed, Paused, Pending, Running, TimedOut, Waiting};
        match (self, next) {
            (Pending, Running) => true,
            (Running, Running | Waiting | Paused | Completed | Failed | TimedOut) => true,
            (Waiting, Running) => true,
            (Paused, Running | Cancelled) => true,
            (Pending | Running | Waiting | Paused, Cancelled) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
    Waiting,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepExecution {
    pub step_id: String,
    pub step_name: String,
    pub step_type: String,
    pub status: StepExecutionStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub input: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowInstance {
    pub instance_id: InstanceId,
    pub workflow_id: WorkflowId,
    pub workflow_version: i64,
    pub organization_id: OrganizationId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_id: Option<TriggerId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_type: Option<TriggerType>,
    #[serde(default)]
    pub trigger_data: Value,
    pub status: InstanceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_step_id: Option<String>,
    #[serde(default)]
    pub step_executions: Vec<StepExecution>,
    #[serde(default)]
    pub variables: Map<String, Value>,
    #[serde(default)]
    pub completed_step_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_instance_id: Option<InstanceId>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<ErrorInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initiated_by: Option<String>,
    #[serde(default)]
    pub activity_log: Vec<ActivityLogEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_stage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_percent: Option<f64>,
    /// Optimistic-concurrency version (§5: conditional writes on instance documents).
    #[serde(default)]
    pub version: u64,
}

impl WorkflowInstance {
    /// Record a `stepId -> variableUpdates` merge: last-write-wins within the step (Testable Property 3).
    pub fn merge_variables(&mut self, updates: &Map<String, Value>) {
        for (k, v) in updates {
            self.variables.insert(k.clone(), v.clone());
        }
    }

    /// Mark a step completed, preserving the duplicate-free invariant on `completed_step_ids`.
    pub fn mark_step_completed(&mut self, step_id: &str) {
        if !self.completed_step_ids.iter().any(|s| s == step_id) {
            self.completed_step_ids.push(step_id.to_string());
        }
    }

    pub fn push_activity(&mut self, message: impl Into<String>, data: Option<Value>) {
        self.activity_log.push(ActivityLogEntry {
            timestamp: Utc::now(),
            message: message.into(),
            data,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completed_step_ids_has_no_duplicates() {
        let mut instance = sample_instance();
        instance.mark_step_completed("s1");
        instance.mark_step_completed("s1");
        instance.mark_step_completed("s2");
        assert_eq!(instance.completed_step_ids, vec!["s1", "s2"]);
    }

    #[test]
    fn merge_variables_last_write_wins() {
        let mut instance = sample_instance();
        instance.variables.insert("a".to_string(), serde_json::json!(1));
        let mut updates = Map::new();
        updates.insert("a".to_string(), serde_json::json!(2));
        updates.insert("b".to_string(), serde_json::json!(3));
        instance.merge_variables(&updates);
        assert_eq!(instance.variables.get("a").unwrap(), &serde_json::json!(2));
        assert_eq!(instance.variables.get("b").unwrap(), &serde_json::json!(3));
    }

    #[test]
    fn instance_status_transitions() {
        assert!(InstanceStatus::Pending.can_transition_to(InstanceStatus::Running));
        assert!(InstanceStatus::Waiting.can_transition_to(InstanceStatus::Running));
        assert!(!InstanceStatus::Completed.can_transition_to(InstanceStatus::Running));
        assert!(InstanceStatus::Paused.can_transition_to(InstanceStatus::Cancelled));
    }

    fn sample_instance() -> WorkflowInstance {
        WorkflowInstance {
            instance_id: InstanceId::new(),
            workflow_id: WorkflowId::new(),
            workflow_version: 1,
            organization_id: OrganizationId::new(),
            trigger_id: None,
            trigger_type: None,
            trigger_data: Value::Null,
            status: InstanceStatus::Pending,
            current_step_id: None,
            step_executions: vec![],
            variables: Map::new(),
            completed_step_ids: vec![],
            correlation_id: None,
            parent_instance_id: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            last_error: None,
            initiated_by: None,
            activity_log: vec![],
            current_stage: None,
            progress_percent: None,
            version: 0,
        }
    }
}
