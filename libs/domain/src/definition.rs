//! `WorkflowDefinition` (§3): the immutable-per-version static blueprint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::common::{VariableSchema, WorkflowSettings};
use crate::ids::{OrganizationId, WorkflowId};
use crate::step::WorkflowStep;
use crate::trigger::TriggerDefinition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefinitionStatus {
    Draft,
    Active,
    Inactive,
    Deprecated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDefinition {
    pub workflow_id: WorkflowId,
    pub version: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: DefinitionStatus,
    pub organization_id: OrganizationId,
    #[serde(default)]
    pub triggers: Vec<TriggerDefinition>,
    pub steps: Vec<WorkflowStep>,
    #[serde(default)]
    pub variable_schema: HashMap<String, VariableSchema>,
    #[serde(default)]
    pub settings: WorkflowSettings,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default)]
    pub is_deleted: bool,
}

impl WorkflowDefinition {
    /// The implicit start step: the one with the lowest `order` (§3 invariant).
    #[must_use]
    pub fn entry_step(&self) -> Option<&WorkflowStep> {
        self.steps.iter().min_by_key(|s| s.order)
    }

    #[must_use]
    pub fn find_step(&self, step_id: &str) -> Option<&WorkflowStep> {
        self.steps.iter().find(|s| s.id == step_id)
    }

    /// Steps sorted ascending by `order`, as the orchestrator loop requires (§4.4 step 1).
    #[must_use]
    pub fn steps_by_order(&self) -> Vec<&WorkflowStep> {
        let mut steps: Vec<&WorkflowStep> = self.steps.iter().collect();
        steps.sort_by_key(|s| s.order);
        steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::{SetVariableConfig, StepKind};

    fn step(id: &str, order: i64) -> WorkflowStep {
        WorkflowStep {
            id: id.to_string(),
            name: id.to_string(),
            kind: StepKind::SetVariable(SetVariableConfig {
                variables: serde_json::json!({}),
            }),
            order,
            is_enabled: true,
            transitions: vec![],
            on_error: None,
            timeout_seconds: None,
        }
    }

    #[test]
    fn entry_step_is_lowest_order() {
        let def = WorkflowDefinition {
            workflow_id: WorkflowId::new(),
            version: 1,
            name: "test".to_string(),
            description: None,
            status: DefinitionStatus::Draft,
            organization_id: OrganizationId::new(),
            triggers: vec![],
            steps: vec![step("b", 2), step("a", 1), step("c", 3)],
            variable_schema: HashMap::new(),
            settings: WorkflowSettings::default(),
            tags: vec![],
            category: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            created_by: None,
            is_deleted: false,
        };
        assert_eq!(def.entry_step().unwrap().id, "a");
        let ordered: Vec<&str> = def.steps_by_order().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ordered, vec!["a", "b", "c"]);
    }
}
