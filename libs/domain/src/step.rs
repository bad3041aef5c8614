//! `WorkflowStep` and its kind-specific configuration (§3).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::condition::ConditionExpression;

/// A directed edge from one step to another (§3 `TransitionRule`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionRule {
    pub target_step_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<ConditionExpression>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_default: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
}

/// Action executed by an `action` step, dispatched by `action_type` (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    HttpRequest,
    PublishEvent,
    CosmosQuery,
    CosmosUpsert,
    CosmosDelete,
    SendCommand,
    SendNotification,
    CallFunction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionConfig {
    pub action_type: ActionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_variable: Option<String>,
    /// Action-type-specific fields (url/headers/body, query/params, etc).
    /// Values may contain `{{ }}` templates, resolved just before execution.
    #[serde(default)]
    pub settings: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionConfig {
    pub conditions: Vec<TransitionRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitConfig {
    pub wait_type: String,
    #[serde(default)]
    pub settings: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HumanConfig {
    #[serde(default)]
    pub approver_roles: Vec<String>,
    #[serde(default)]
    pub approver_users: Vec<String>,
    #[serde(default = "default_required_approvals")]
    pub required_approvals: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in_seconds: Option<i64>,
    #[serde(default)]
    pub context: Value,
}

const fn default_required_approvals() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformConfig {
    pub expression: String,
    pub output_variable: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptConfig {
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetVariableConfig {
    /// Map of variable name to an (unresolved) expression tree.
    pub variables: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelayConfig {
    pub delay_seconds: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubworkflowConfig {
    pub template_id: Option<String>,
    #[serde(default)]
    pub input_mapping: Value,
    #[serde(default)]
    pub output_mapping: Value,
    #[serde(default)]
    pub wait_for_completion: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParallelConfig {
    pub branches: Vec<Vec<String>>,
    #[serde(default = "default_join_policy")]
    pub join_policy: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_timeout_seconds: Option<u64>,
}

fn default_join_policy() -> String {
    "all".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopConfig {
    pub collection: String,
    pub body_step_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub break_condition: Option<ConditionExpression>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrency: Option<u32>,
}

/// `WorkflowStep::kind` (§3), carrying exactly one kind-specific config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum StepKind {
    Action(ActionConfig),
    Decision(DecisionConfig),
    Parallel(ParallelConfig),
    Wait(WaitConfig),
    Loop(LoopConfig),
    Human(HumanConfig),
    Subworkflow(SubworkflowConfig),
    Transform(TransformConfig),
    Script(ScriptConfig),
    SetVariable(SetVariableConfig),
    Delay(DelayConfig),
    Retry,
    Compensate,
    Terminate,
}

impl StepKind {
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Action(_) => "action",
            Self::Decision(_) => "decision",
            Self::Parallel(_) => "parallel",
            Self::Wait(_) => "wait",
            Self::Loop(_) => "loop",
            Self::Human(_) => "human",
            Self::Subworkflow(_) => "subworkflow",
            Self::Transform(_) => "transform",
            Self::Script(_) => "script",
            Self::SetVariable(_) => "setVariable",
            Self::Delay(_) => "delay",
            Self::Retry => "retry",
            Self::Compensate => "compensate",
            Self::Terminate => "terminate",
        }
    }

    /// Kinds whose dispatcher result always requires orchestrator handling
    /// beyond the uniform `StepResult` (§4.3).
    #[must_use]
    pub const fn requires_orchestration(&self) -> bool {
        matches!(
            self,
            Self::Wait(_)
                | Self::Delay(_)
                | Self::Parallel(_)
                | Self::Loop(_)
                | Self::Subworkflow(_)
                | Self::Human(_)
                | Self::Retry
                | Self::Compensate
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffType {
    Fixed,
    Exponential,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorAction {
    Skip,
    Retry,
    Goto,
    Compensate,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    pub max_attempts: u32,
    #[serde(default)]
    pub backoff_type: BackoffType,
    #[serde(default)]
    pub initial_delay_seconds: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_delay_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retryable_errors: Option<Vec<String>>,
}

impl Default for BackoffType {
    fn default() -> Self {
        Self::Fixed
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnErrorPolicy {
    pub action: ErrorAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_policy: Option<RetryPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_step_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStep {
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    pub kind: StepKind,
    pub order: i64,
    #[serde(default = "default_true")]
    pub is_enabled: bool,
    #[serde(default)]
    pub transitions: Vec<TransitionRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_error: Option<OnErrorPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
}

const fn default_true() -> bool {
    true
}
