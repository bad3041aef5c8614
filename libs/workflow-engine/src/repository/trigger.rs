//! Trigger Registry (§2 item 7): event-type-indexed lookup of `WorkflowTrigger`.

use std::sync::Arc;
use thiserror::Error;

use strata_domain::ids::{OrganizationId, TriggerId, WorkflowId};
use strata_domain::trigger::WorkflowTrigger;

use crate::store::{collections, Store, StoreError, StoredDocument};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub struct TriggerRepository {
    store: Arc<dyn Store>,
}

impl TriggerRepository {
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn register(&self, trigger: &WorkflowTrigger, organization_id: OrganizationId) -> Result<(), RepositoryError> {
        tracing::info!(trigger_id = %trigger.trigger_id, event_type = %trigger.event_type, "registering trigger");
        self.store
            .upsert(
                collections::TRIGGERS,
                StoredDocument {
                    id: trigger.trigger_id.to_string(),
                    partition_key: organization_id.to_string(),
                    version: 0,
                    data: serde_json::to_value(trigger)?,
                },
            )
            .await?;
        Ok(())
    }

    pub async fn unregister(&self, organization_id: OrganizationId, trigger_id: TriggerId) -> Result<(), RepositoryError> {
        tracing::info!(%trigger_id, "unregistering trigger");
        self.store
            .delete(collections::TRIGGERS, &trigger_id.to_string(), &organization_id.to_string())
            .await?;
        Ok(())
    }

    /// All active event triggers for `event_type` in this organization,
    /// sorted descending by priority (§4.5: higher priority evaluated first).
    pub async fn find_by_event_type(
        &self,
        organization_id: OrganizationId,
        event_type: &str,
    ) -> Result<Vec<WorkflowTrigger>, RepositoryError> {
        let docs = self
            .store
            .query(collections::TRIGGERS, Some(&organization_id.to_string()), "", &serde_json::Value::Null)
            .await?;
        let mut triggers: Vec<WorkflowTrigger> = docs
            .into_iter()
            .filter_map(|d| serde_json::from_value::<WorkflowTrigger>(d.data).ok())
            .filter(|t| t.is_active && t.event_type == event_type)
            .collect();
        triggers.sort_by_key(|t| std::cmp::Reverse(t.priority));
        Ok(triggers)
    }

    pub async fn unregister_by_workflow(
        &self,
        organization_id: OrganizationId,
        workflow_id: WorkflowId,
    ) -> Result<(), RepositoryError> {
        let docs = self
            .store
            .query(collections::TRIGGERS, Some(&organization_id.to_string()), "", &serde_json::Value::Null)
            .await?;
        for doc in docs {
            if let Ok(trigger) = serde_json::from_value::<WorkflowTrigger>(doc.data) {
                if trigger.workflow_id == workflow_id {
                    self.unregister(organization_id, trigger.trigger_id).await?;
                }
            }
        }
        Ok(())
    }
}
