//! Approval Repository (§2 item 6): lifecycle CRUD for `ApprovalRequest`.

use std::sync::Arc;
use thiserror::Error;

use strata_domain::ids::{ApprovalId, OrganizationId};
use strata_domain::approval::ApprovalRequest;

use crate::store::{collections, Store, StoreError, StoredDocument};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("approval not found: {0}")]
    NotFound(ApprovalId),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub struct ApprovalRepository {
    store: Arc<dyn Store>,
}

impl ApprovalRepository {
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn get(
        &self,
        organization_id: OrganizationId,
        approval_id: ApprovalId,
    ) -> Result<ApprovalRequest, RepositoryError> {
        let doc = self
            .store
            .get(collections::APPROVALS, &approval_id.to_string(), &organization_id.to_string())
            .await?
            .ok_or(RepositoryError::NotFound(approval_id))?;
        Ok(serde_json::from_value(doc.data)?)
    }

    pub async fn save(&self, approval: &ApprovalRequest) -> Result<ApprovalRequest, RepositoryError> {
        tracing::debug!(approval_id = %approval.approval_id, status = ?approval.status, "saving approval");
        let stored = self
            .store
            .upsert(
                collections::APPROVALS,
                StoredDocument {
                    id: approval.approval_id.to_string(),
                    partition_key: approval.organization_id.to_string(),
                    version: approval.version,
                    data: serde_json::to_value(approval)?,
                },
            )
            .await?;
        Ok(serde_json::from_value(stored.data)?)
    }

    /// All pending approvals in the organization, for `expireApprovals` to sweep.
    pub async fn list_pending(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<ApprovalRequest>, RepositoryError> {
        let docs = self
            .store
            .query(collections::APPROVALS, Some(&organization_id.to_string()), "", &serde_json::Value::Null)
            .await?;
        Ok(docs
            .into_iter()
            .filter_map(|d| serde_json::from_value::<ApprovalRequest>(d.data).ok())
            .filter(|a| a.status == strata_domain::approval::ApprovalStatus::Pending)
            .collect())
    }
}
