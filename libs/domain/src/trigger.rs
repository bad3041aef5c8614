//! Trigger declarations (embedded in a definition) and the runtime registry
//! entry projected from event-kind triggers (§3, §4.5).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::ids::{TriggerId, WorkflowId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    Event,
    Http,
    Schedule,
    Manual,
}

/// A trigger declaration embedded in `WorkflowDefinition::triggers`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerDefinition {
    pub id: String,
    pub trigger_type: TriggerType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_filter: Option<String>,
    #[serde(default)]
    pub extract_variables: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

const fn default_true() -> bool {
    true
}

/// `WorkflowTrigger` registry entry (§3): only event-kind triggers are
/// projected here; HTTP/schedule/manual triggers are invoked through other
/// paths and never appear in this collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowTrigger {
    pub trigger_id: TriggerId,
    pub workflow_id: WorkflowId,
    pub workflow_version: i64,
    pub is_active: bool,
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_filter: Option<String>,
    #[serde(default)]
    pub extract_variables: HashMap<String, String>,
    #[serde(default)]
    pub priority: i64,
}
