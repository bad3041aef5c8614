//! Small value types shared by several entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,
}

impl ErrorInfo {
    #[must_use]
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            step_id: None,
        }
    }

    #[must_use]
    pub fn with_step(mut self, step_id: impl Into<String>) -> Self {
        self.step_id = Some(step_id.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLogEntry {
    pub timestamp: DateTime<Utc>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Variable schema entry for a named workflow variable (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableSchema {
    #[serde(rename = "type")]
    pub var_type: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSettings {
    #[serde(default = "default_max_execution_seconds")]
    pub max_execution_seconds: i64,
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel_execution_policy: Option<String>,
    #[serde(default)]
    pub notification_targets: Vec<String>,
    #[serde(default)]
    pub audit_enabled: bool,
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
}

const fn default_max_execution_seconds() -> i64 {
    86_400
}

const fn default_retention_days() -> i64 {
    90
}

const fn default_max_steps() -> u32 {
    1000
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            max_execution_seconds: default_max_execution_seconds(),
            retention_days: default_retention_days(),
            parallel_execution_policy: None,
            notification_targets: Vec::new(),
            audit_enabled: false,
            max_steps: default_max_steps(),
        }
    }
}
