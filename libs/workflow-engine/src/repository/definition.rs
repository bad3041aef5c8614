//! Definition Repository (§2 item 4): CRUD + versioning over `WorkflowDefinition`.

use std::sync::Arc;
use thiserror::Error;

use strata_domain::definition::{DefinitionStatus, WorkflowDefinition};
use strata_domain::ids::{OrganizationId, WorkflowId};

use crate::store::{collections, Store, StoreError, StoredDocument};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("definition not found: {0}/{1}")]
    NotFound(WorkflowId, i64),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn doc_id(workflow_id: WorkflowId, version: i64) -> String {
    format!("{workflow_id}:{version}")
}

/// Typed wrapper over `Store` for `workflowDefinitions` (§6). Partitioned by
/// organization, so two organizations' workflow IDs never collide in lookup.
pub struct DefinitionRepository {
    store: Arc<dyn Store>,
}

impl DefinitionRepository {
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn get(
        &self,
        organization_id: OrganizationId,
        workflow_id: WorkflowId,
        version: i64,
    ) -> Result<WorkflowDefinition, RepositoryError> {
        let id = doc_id(workflow_id, version);
        let doc = self
            .store
            .get(collections::DEFINITIONS, &id, &organization_id.to_string())
            .await?
            .ok_or(RepositoryError::NotFound(workflow_id, version))?;
        Ok(serde_json::from_value(doc.data)?)
    }

    /// All versions of a workflow, across the organization partition.
    pub async fn list_versions(
        &self,
        organization_id: OrganizationId,
        workflow_id: WorkflowId,
    ) -> Result<Vec<WorkflowDefinition>, RepositoryError> {
        let docs = self
            .store
            .query(collections::DEFINITIONS, Some(&organization_id.to_string()), "", &serde_json::Value::Null)
            .await?;
        let mut definitions: Vec<WorkflowDefinition> = docs
            .into_iter()
            .filter_map(|d| serde_json::from_value::<WorkflowDefinition>(d.data).ok())
            .filter(|d| d.workflow_id == workflow_id)
            .collect();
        definitions.sort_by_key(|d| d.version);
        Ok(definitions)
    }

    /// Create or overwrite one version. `version` in the stored document's
    /// optimistic-concurrency envelope is distinct from the workflow's own
    /// `version` field (the one the operator assigns); writes here always
    /// target a fresh store-level version since each `(workflowId, version)`
    /// pair is an immutable document once created.
    pub async fn save(&self, definition: &WorkflowDefinition) -> Result<(), RepositoryError> {
        let id = doc_id(definition.workflow_id, definition.version);
        let existing = self
            .store
            .get(collections::DEFINITIONS, &id, &definition.organization_id.to_string())
            .await?;
        let store_version = existing.map_or(0, |d| d.version);
        self.store
            .upsert(
                collections::DEFINITIONS,
                StoredDocument {
                    id,
                    partition_key: definition.organization_id.to_string(),
                    version: store_version,
                    data: serde_json::to_value(definition)?,
                },
            )
            .await?;
        Ok(())
    }

    /// Testable Property 4: activating a new version deactivates every
    /// other version of the same workflow that was `Active`.
    pub async fn activate(
        &self,
        organization_id: OrganizationId,
        workflow_id: WorkflowId,
        version: i64,
    ) -> Result<(), RepositoryError> {
        let versions = self.list_versions(organization_id, workflow_id).await?;
        for mut definition in versions {
            if definition.version == version {
                definition.status = DefinitionStatus::Active;
                self.save(&definition).await?;
            } else if definition.status == DefinitionStatus::Active {
                tracing::info!(%workflow_id, version = definition.version, "deactivating superseded definition version");
                definition.status = DefinitionStatus::Inactive;
                self.save(&definition).await?;
            }
        }
        Ok(())
    }

    pub async fn deactivate(
        &self,
        organization_id: OrganizationId,
        workflow_id: WorkflowId,
        version: i64,
    ) -> Result<(), RepositoryError> {
        let mut definition = self.get(organization_id, workflow_id, version).await?;
        definition.status = DefinitionStatus::Inactive;
        self.save(&definition).await
    }
}
