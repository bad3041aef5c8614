//! Approval Sub-Machine (§2 item 9, §4.6).

use std::sync::Arc;
use thiserror::Error;

use chrono::{DateTime, Utc};
use serde_json::Value;
use strata_common::clock::Clock;
use strata_domain::approval::{ApprovalDecision, ApprovalRequest, ApprovalStatus, DecisionValue};
use strata_domain::ids::{ApprovalId, InstanceId, OrganizationId, WorkflowId};

use crate::events::{publish_workflow_event, Publisher, WorkflowEvent};
use crate::repository::approval::{ApprovalRepository, RepositoryError};

#[derive(Debug, Error)]
pub enum ApprovalError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("E_STATE_INVALID: approval {0} is not pending")]
    NotPending(ApprovalId),
    #[error("E_STATE_INVALID: user {0} already decided on approval {1}")]
    AlreadyDecided(String, ApprovalId),
    #[error("E_STATE_INVALID: approval {0} has expired")]
    Expired(ApprovalId),
}

pub struct CreateApprovalParams {
    pub instance_id: InstanceId,
    pub workflow_id: WorkflowId,
    pub step_id: String,
    pub organization_id: OrganizationId,
    pub approver_roles: Vec<String>,
    pub approver_users: Vec<String>,
    pub required_approvals: u32,
    pub expires_in_seconds: Option<i64>,
    pub context: Value,
}

pub struct ApprovalMachine {
    repository: ApprovalRepository,
    publisher: Arc<dyn Publisher>,
    clock: Arc<dyn Clock>,
}

impl ApprovalMachine {
    #[must_use]
    pub fn new(repository: ApprovalRepository, publisher: Arc<dyn Publisher>, clock: Arc<dyn Clock>) -> Self {
        Self { repository, publisher, clock }
    }

    /// `createApproval(params)` (§4.6).
    pub async fn create_approval(&self, params: CreateApprovalParams) -> Result<ApprovalRequest, ApprovalError> {
        let now = self.clock.now();
        let approval = ApprovalRequest {
            approval_id: ApprovalId::new(),
            instance_id: params.instance_id,
            workflow_id: params.workflow_id,
            step_id: params.step_id,
            organization_id: params.organization_id,
            approver_roles: params.approver_roles,
            approver_users: params.approver_users,
            required_approvals: params.required_approvals.max(1),
            current_approvals: 0,
            context: params.context,
            requested_at: now,
            expires_at: params.expires_in_seconds.map(|s| now + chrono::Duration::seconds(s)),
            status: ApprovalStatus::Pending,
            decisions: vec![],
            version: 0,
        };
        Ok(self.repository.save(&approval).await?)
    }

    /// `recordApprovalDecision` (§4.6).
    pub async fn record_decision(
        &self,
        organization_id: OrganizationId,
        approval_id: ApprovalId,
        user_id: &str,
        decision: DecisionValue,
        comment: Option<String>,
        data: Option<Value>,
    ) -> Result<ApprovalRequest, ApprovalError> {
        let mut approval = self.repository.get(organization_id, approval_id).await?;

        if approval.status != ApprovalStatus::Pending {
            return Err(ApprovalError::NotPending(approval_id));
        }
        if approval.has_decision_from(user_id) {
            return Err(ApprovalError::AlreadyDecided(user_id.to_string(), approval_id));
        }
        if let Some(expires_at) = approval.expires_at {
            if expires_at < self.clock.now() {
                return Err(ApprovalError::Expired(approval_id));
            }
        }

        approval.decisions.push(ApprovalDecision {
            user_id: user_id.to_string(),
            decision,
            comment,
            data,
            decided_at: self.clock.now(),
        });

        match decision {
            // Rejection finality (Testable Property 7): dominates regardless
            // of how many approvals have already accumulated.
            DecisionValue::Rejected => approval.status = ApprovalStatus::Rejected,
            DecisionValue::Approved => {
                approval.current_approvals += 1;
                if approval.current_approvals >= approval.required_approvals {
                    approval.status = ApprovalStatus::Approved;
                }
            }
        }

        let saved = self.repository.save(&approval).await?;
        if saved.status.is_terminal() {
            publish_workflow_event(
                &self.publisher,
                &WorkflowEvent::ApprovalCompleted {
                    instance_id: saved.instance_id,
                    approval_id: saved.approval_id.to_string(),
                    status: status_label(saved.status).to_string(),
                },
            )
            .await;
        }
        Ok(saved)
    }

    /// `reassignApproval(approvalId, toUserId, reason?)` (§4.6, §9): close the
    /// original with a synthetic "approved" marker (not a real decision — see
    /// module docs) and open a fresh pending approval naming only `toUserId`.
    pub async fn reassign(
        &self,
        organization_id: OrganizationId,
        approval_id: ApprovalId,
        to_user_id: &str,
        reason: Option<String>,
    ) -> Result<ApprovalRequest, ApprovalError> {
        let mut original = self.repository.get(organization_id, approval_id).await?;
        if original.status != ApprovalStatus::Pending {
            return Err(ApprovalError::NotPending(approval_id));
        }

        original.decisions.push(ApprovalDecision {
            user_id: "system:reassign".to_string(),
            decision: DecisionValue::Approved,
            comment: reason,
            data: None,
            decided_at: self.clock.now(),
        });
        original.status = ApprovalStatus::Reassigned;
        self.repository.save(&original).await?;

        let fresh = ApprovalRequest {
            approval_id: ApprovalId::new(),
            instance_id: original.instance_id,
            workflow_id: original.workflow_id,
            step_id: original.step_id.clone(),
            organization_id,
            approver_roles: vec![],
            approver_users: vec![to_user_id.to_string()],
            required_approvals: original.required_approvals,
            current_approvals: 0,
            context: original.context.clone(),
            requested_at: self.clock.now(),
            expires_at: original.expires_at,
            status: ApprovalStatus::Pending,
            decisions: vec![],
            version: 0,
        };
        Ok(self.repository.save(&fresh).await?)
    }

    /// `expireApprovals()` (§4.6): sweep every pending approval past its
    /// `expiresAt`.
    pub async fn expire_approvals(&self, organization_id: OrganizationId) -> Result<Vec<ApprovalId>, ApprovalError> {
        let now = self.clock.now();
        let pending = self.repository.list_pending(organization_id).await?;
        let mut expired = Vec::new();
        for mut approval in pending {
            let should_expire = approval.expires_at.is_some_and(|at| is_past(at, now));
            if should_expire {
                approval.status = ApprovalStatus::Expired;
                self.repository.save(&approval).await?;
                publish_workflow_event(
                    &self.publisher,
                    &WorkflowEvent::ApprovalCompleted {
                        instance_id: approval.instance_id,
                        approval_id: approval.approval_id.to_string(),
                        status: "expired".to_string(),
                    },
                )
                .await;
                expired.push(approval.approval_id);
            }
        }
        Ok(expired)
    }
}

fn is_past(at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    at < now
}

fn status_label(status: ApprovalStatus) -> &'static str {
    match status {
        ApprovalStatus::Pending => "pending",
        ApprovalStatus::Approved => "approved",
        ApprovalStatus::Rejected => "rejected",
        ApprovalStatus::Reassigned => "reassigned",
        ApprovalStatus::Expired => "expired",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::logging_publisher;
    use crate::store::InMemoryStore;
    use strata_common::clock::{system_clock, FixedClock};

    fn machine() -> ApprovalMachine {
        let store: Arc<dyn crate::store::Store> = Arc::new(InMemoryStore::new());
        ApprovalMachine::new(ApprovalRepository::new(store), logging_publisher(), system_clock())
    }

    fn params(org: OrganizationId) -> CreateApprovalParams {
        CreateApprovalParams {
            instance_id: InstanceId::new(),
            workflow_id: WorkflowId::new(),
            step_id: "gate".to_string(),
            organization_id: org,
            approver_roles: vec!["mgr".to_string()],
            approver_users: vec![],
            required_approvals: 2,
            expires_in_seconds: None,
            context: Value::Null,
        }
    }

    #[tokio::test]
    async fn scenario_d_two_approvals_finalize_approved() {
        let machine = machine();
        let org = OrganizationId::new();
        let created = machine.create_approval(params(org)).await.unwrap();

        machine
            .record_decision(org, created.approval_id, "u1", DecisionValue::Approved, None, None)
            .await
            .unwrap();
        let final_state = machine
            .record_decision(org, created.approval_id, "u2", DecisionValue::Approved, None, None)
            .await
            .unwrap();

        assert_eq!(final_state.status, ApprovalStatus::Approved);
    }

    #[tokio::test]
    async fn scenario_e_rejection_dominates() {
        let machine = machine();
        let org = OrganizationId::new();
        let created = machine.create_approval(params(org)).await.unwrap();

        machine
            .record_decision(org, created.approval_id, "u1", DecisionValue::Approved, None, None)
            .await
            .unwrap();
        let final_state = machine
            .record_decision(org, created.approval_id, "u2", DecisionValue::Rejected, None, None)
            .await
            .unwrap();

        assert_eq!(final_state.status, ApprovalStatus::Rejected);
    }

    #[tokio::test]
    async fn same_user_cannot_decide_twice() {
        let machine = machine();
        let org = OrganizationId::new();
        let created = machine.create_approval(params(org)).await.unwrap();
        machine
            .record_decision(org, created.approval_id, "u1", DecisionValue::Approved, None, None)
            .await
            .unwrap();
        let err = machine
            .record_decision(org, created.approval_id, "u1", DecisionValue::Approved, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApprovalError::AlreadyDecided(_, _)));
    }

    #[tokio::test]
    async fn expire_approvals_sweeps_past_deadline() {
        let clock = FixedClock::new(Utc::now());
        let store: Arc<dyn crate::store::Store> = Arc::new(InMemoryStore::new());
        let machine = ApprovalMachine::new(ApprovalRepository::new(store), logging_publisher(), Arc::new(clock.clone()));
        let org = OrganizationId::new();
        let mut p = params(org);
        p.expires_in_seconds = Some(10);
        let created = machine.create_approval(p).await.unwrap();

        clock.advance(std::time::Duration::from_secs(20));
        let expired = machine.expire_approvals(org).await.unwrap();
        assert_eq!(expired, vec![created.approval_id]);
    }
}
