//! Instance Repository (§2 item 5): CRUD plus the step-execution/activity
//! log appends and stage/progress bookkeeping the orchestrator drives.

use std::sync::Arc;
use thiserror::Error;

use strata_domain::ids::{InstanceId, OrganizationId};
use strata_domain::instance::{StepExecution, WorkflowInstance};

use crate::store::{collections, Store, StoreError, StoredDocument};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("instance not found: {0}")]
    NotFound(InstanceId),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub struct InstanceRepository {
    store: Arc<dyn Store>,
}

impl InstanceRepository {
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn get(
        &self,
        organization_id: OrganizationId,
        instance_id: InstanceId,
    ) -> Result<WorkflowInstance, RepositoryError> {
        let doc = self
            .store
            .get(collections::INSTANCES, &instance_id.to_string(), &organization_id.to_string())
            .await?
            .ok_or(RepositoryError::NotFound(instance_id))?;
        Ok(serde_json::from_value(doc.data)?)
    }

    /// Persist the instance with its conditional version (§5: whole-document
    /// conditional writes — the caller must have loaded `instance` from this
    /// repository first, so `instance.version` reflects the last read).
    pub async fn save(&self, instance: &WorkflowInstance) -> Result<WorkflowInstance, RepositoryError> {
        tracing::debug!(instance_id = %instance.instance_id, status = ?instance.status, "saving instance");
        let stored = self
            .store
            .upsert(
                collections::INSTANCES,
                StoredDocument {
                    id: instance.instance_id.to_string(),
                    partition_key: instance.organization_id.to_string(),
                    version: instance.version,
                    data: serde_json::to_value(instance)?,
                },
            )
            .await?;
        Ok(serde_json::from_value(stored.data)?)
    }

    /// Append a step execution and persist. Read-modify-write against the
    /// latest document rather than trusting a possibly-stale in-memory copy.
    pub async fn append_step_execution(
        &self,
        organization_id: OrganizationId,
        instance_id: InstanceId,
        execution: StepExecution,
    ) -> Result<WorkflowInstance, RepositoryError> {
        let mut instance = self.get(organization_id, instance_id).await?;
        instance.step_executions.push(execution);
        self.save(&instance).await
    }

    pub async fn list_by_workflow(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<WorkflowInstance>, RepositoryError> {
        let docs = self
            .store
            .query(collections::INSTANCES, Some(&organization_id.to_string()), "", &serde_json::Value::Null)
            .await?;
        Ok(docs
            .into_iter()
            .filter_map(|d| serde_json::from_value::<WorkflowInstance>(d.data).ok())
            .collect())
    }
}
