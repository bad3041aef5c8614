//! `ApprovalRequest` (§3): the gating record behind `human`/`wait(approval)` steps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{ApprovalId, InstanceId, OrganizationId, WorkflowId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    Reassigned,
    Expired,
}

impl ApprovalStatus {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionValue {
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalDecision {
    pub user_id: String,
    pub decision: DecisionValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    pub decided_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRequest {
    pub approval_id: ApprovalId,
    pub instance_id: InstanceId,
    pub workflow_id: WorkflowId,
    pub step_id: String,
    pub organization_id: OrganizationId,
    #[serde(default)]
    pub approver_roles: Vec<String>,
    #[serde(default)]
    pub approver_users: Vec<String>,
    pub required_approvals: u32,
    #[serde(default)]
    pub current_approvals: u32,
    #[serde(default)]
    pub context: Value,
    pub requested_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub status: ApprovalStatus,
    #[serde(default)]
    pub decisions: Vec<ApprovalDecision>,
    /// Optimistic-concurrency version, mirroring `WorkflowInstance::version` (§5).
    #[serde(default)]
    pub version: u64,
}

impl ApprovalRequest {
    #[must_use]
    pub fn has_decision_from(&self, user_id: &str) -> bool {
        self.decisions.iter().any(|d| d.user_id == user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_decision_from_fresh_user() {
        let approval = sample();
        assert!(!approval.has_decision_from("u1"));
    }

    fn sample() -> ApprovalRequest {
        ApprovalRequest {
            approval_id: ApprovalId::new(),
            instance_id: InstanceId::new(),
            workflow_id: WorkflowId::new(),
            step_id: "gate".to_string(),
            organization_id: OrganizationId::new(),
            approver_roles: vec![],
            approver_users: vec![],
            required_approvals: 2,
            current_approvals: 0,
            context: Value::Null,
            requested_at: Utc::now(),
            expires_at: None,
            status: ApprovalStatus::Pending,
            decisions: vec![],
            version: 0,
        }
    }
}
