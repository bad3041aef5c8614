//! `WorkflowTemplate` (§3): a parameterized definition blueprint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::common::{VariableSchema, WorkflowSettings};
use crate::ids::TemplateId;
use crate::step::WorkflowStep;
use crate::trigger::TriggerDefinition;

/// The base workflow a template instantiates from, before fresh IDs are minted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateBase {
    #[serde(default)]
    pub triggers: Vec<TriggerDefinition>,
    pub steps: Vec<WorkflowStep>,
    #[serde(default)]
    pub variable_schema: HashMap<String, VariableSchema>,
    #[serde(default)]
    pub settings: WorkflowSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowTemplate {
    pub template_id: TemplateId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub base: TemplateBase,
    #[serde(default)]
    pub required_variables: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_schema: Option<Value>,
    pub created_at: DateTime<Utc>,
}
