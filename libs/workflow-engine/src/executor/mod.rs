//! Step Execution Dispatcher (§2 item 3, §4.3): dispatch-by-variant over
//! `StepKind`, producing the uniform [`types::StepResult`] every step kind
//! returns.

pub mod action;
pub mod script;
pub mod simple;
pub mod types;

use std::sync::Arc;
use thiserror::Error;

use strata_domain::common::ErrorInfo;
use strata_domain::step::{StepKind, WorkflowStep};

use crate::events::Publisher;
use crate::expression::{resolve_object, ExpressionContext};
use crate::store::Store;

use action::{create_action_executor, ActionDeps};
use types::StepResult;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("step {step_id} requires orchestrator-level handling")]
    RequiresOrchestration { step_id: String },
}

/// Everything the dispatcher needs to run any step kind, assembled once per
/// orchestrator and shared across executions.
#[derive(Clone)]
pub struct StepDispatcher {
    deps: ActionDeps,
}

impl StepDispatcher {
    #[must_use]
    pub fn new(http_client: reqwest::Client, publisher: Arc<dyn Publisher>, store: Arc<dyn Store>) -> Self {
        Self {
            deps: ActionDeps { http_client, publisher, store },
        }
    }

    /// Run a single step. Never returns `Err` for step-level failures
    /// (those come back as `StepResult { success: false, .. }`, per §4.4's
    /// contract that the orchestrator synthesizes `STEP_EXECUTION_ERROR`
    /// only on *internal* faults); this dispatcher has none of those to
    /// surface, so it's effectively infallible, but keeps a `Result` shape
    /// to match the orchestrator's call site.
    pub async fn dispatch(&self, step: &WorkflowStep, ctx: &ExpressionContext) -> Result<StepResult, ExecutorError> {
        let result = match &step.kind {
            StepKind::Action(config) => {
                let settings = resolve_object(&config.settings, ctx);
                let executor = create_action_executor(config.action_type, &self.deps);
                match executor.execute(&settings).await {
                    Ok(output) => {
                        let mut result = StepResult::success(output.clone());
                        if let Some(var) = &config.output_variable {
                            let mut updates = serde_json::Map::new();
                            updates.insert(var.clone(), output);
                            result = result.with_variable_updates(updates);
                        }
                        result
                    }
                    Err(e) => StepResult::failure(ErrorInfo::new(e.code(), e.to_string()).with_step(step.id.clone())),
                }
            }
            StepKind::Decision(config) => simple::execute_decision(config, ctx),
            StepKind::Wait(config) => simple::execute_wait(config),
            StepKind::Transform(config) => simple::execute_transform(config, ctx),
            StepKind::SetVariable(config) => simple::execute_set_variable(config, ctx),
            StepKind::Delay(config) => simple::execute_delay(config.delay_seconds),
            StepKind::Terminate => simple::execute_terminate(),
            StepKind::Script(config) => match script::run_script(&config.source, ctx, config.timeout_seconds).await {
                Ok(output) => StepResult::success(output),
                Err(error) => StepResult::failure(error.with_step(step.id.clone())),
            },
            StepKind::Human(config) => StepResult::requires_orchestration(
                "human",
                serde_json::json!({
                    "approverRoles": config.approver_roles,
                    "approverUsers": config.approver_users,
                    "requiredApprovals": config.required_approvals,
                    "expiresInSeconds": config.expires_in_seconds,
                }),
            ),
            StepKind::Parallel(config) => {
                StepResult::requires_orchestration("parallel", serde_json::json!({ "branches": config.branches }))
            }
            StepKind::Loop(config) => StepResult::requires_orchestration(
                "loop",
                serde_json::json!({ "collection": config.collection, "bodyStepId": config.body_step_id }),
            ),
            StepKind::Subworkflow(config) => StepResult::requires_orchestration(
                "subworkflow",
                serde_json::json!({ "templateId": config.template_id }),
            ),
            StepKind::Retry => StepResult::requires_orchestration("retry", serde_json::Value::Null),
            StepKind::Compensate => StepResult::requires_orchestration("compensate", serde_json::Value::Null),
        };
        Ok(result)
    }
}
