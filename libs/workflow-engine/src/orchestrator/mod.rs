//! The Orchestrator Loop (§2 item 8, §4.4): `executeWorkflow`/`resumeWorkflow`.

use std::sync::Arc;
use thiserror::Error;

use chrono::Utc;
use serde_json::{Map, Value};
use strata_common::clock::Clock;
use strata_domain::common::ErrorInfo;
use strata_domain::ids::{InstanceId, OrganizationId};
use strata_domain::instance::{InstanceStatus, StepExecution, StepExecutionStatus, WorkflowInstance};
use strata_domain::step::{BackoffType, ErrorAction, WorkflowStep};

use crate::condition::find_matching_transition;
use crate::events::{publish_workflow_event, Publisher, WorkflowEvent};
use crate::executor::StepDispatcher;
use crate::expression::ExpressionContext;
use crate::repository::definition::{DefinitionRepository, RepositoryError as DefinitionRepoError};
use crate::repository::instance::{InstanceRepository, RepositoryError as InstanceRepoError};

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Definition(#[from] DefinitionRepoError),
    #[error(transparent)]
    Instance(#[from] InstanceRepoError),
    #[error("E_INVALID_STATE: {0}")]
    InvalidState(String),
    #[error("step not found: {0}")]
    StepNotFound(String),
}

pub struct Orchestrator {
    definitions: DefinitionRepository,
    instances: InstanceRepository,
    dispatcher: StepDispatcher,
    publisher: Arc<dyn Publisher>,
    clock: Arc<dyn Clock>,
}

impl Orchestrator {
    #[must_use]
    pub fn new(
        definitions: DefinitionRepository,
        instances: InstanceRepository,
        dispatcher: StepDispatcher,
        publisher: Arc<dyn Publisher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { definitions, instances, dispatcher, publisher, clock }
    }

    /// `executeWorkflow(instanceId, options)` (§4.4).
    pub async fn execute_workflow(
        &self,
        organization_id: OrganizationId,
        instance_id: InstanceId,
    ) -> Result<WorkflowInstance, OrchestratorError> {
        let mut instance = self.instances.get(organization_id, instance_id).await?;
        let definition = self
            .definitions
            .get(organization_id, instance.workflow_id, instance.workflow_version)
            .await?;
        let steps = definition.steps_by_order();

        if instance.status == InstanceStatus::Pending {
            instance.status = InstanceStatus::Running;
            instance.started_at = Some(self.clock.now());
        }
        if instance.current_step_id.is_none() {
            instance.current_step_id = steps.first().map(|s| s.id.clone());
        }
        instance = self.instances.save(&instance).await?;

        let max_steps = definition.settings.max_steps as usize;
        let max_execution_seconds = definition.settings.max_execution_seconds;
        let mut executed = 0usize;

        while let Some(current_step_id) = instance.current_step_id.clone() {
            if let Some(cancelled) = self.observe_cancellation(organization_id, instance_id).await? {
                tracing::info!(%instance_id, "instance cancelled, observed at step boundary");
                return Ok(cancelled);
            }
            if executed >= max_steps {
                break;
            }
            if let Some(started_at) = instance.started_at {
                if (self.clock.now() - started_at).num_seconds() > max_execution_seconds {
                    instance.status = InstanceStatus::TimedOut;
                    instance.completed_at = Some(self.clock.now());
                    instance = self.instances.save(&instance).await?;
                    tracing::warn!(%instance_id, "instance timed out");
                    publish_workflow_event(&self.publisher, &WorkflowEvent::InstanceTimedOut { instance_id }).await;
                    return Ok(instance);
                }
            }

            let Some(step) = definition.find_step(&current_step_id) else {
                tracing::warn!(%instance_id, step_id = %current_step_id, "step not found, failing instance");
                instance.status = InstanceStatus::Failed;
                instance.last_error = Some(ErrorInfo::new("STEP_NOT_FOUND", current_step_id.clone()));
                instance.completed_at = Some(self.clock.now());
                instance = self.instances.save(&instance).await?;
                publish_workflow_event(
                    &self.publisher,
                    &WorkflowEvent::InstanceFailed {
                        instance_id,
                        error: serde_json::json!({ "code": "STEP_NOT_FOUND", "stepId": current_step_id }),
                    },
                )
                .await;
                return Ok(instance);
            };

            tracing::debug!(%instance_id, step_id = %current_step_id, step_kind = step.kind.label(), "entering step");
            let outcome = self.run_step(&mut instance, step).await;
            executed += 1;
            instance = self.instances.save(&instance).await?;

            match outcome {
                StepOutcome::Terminated => {
                    instance.status = InstanceStatus::Completed;
                    instance.completed_at = Some(self.clock.now());
                    instance.current_step_id = None;
                    instance = self.instances.save(&instance).await?;
                    tracing::info!(%instance_id, "instance completed (terminate step)");
                    publish_workflow_event(&self.publisher, &WorkflowEvent::InstanceCompleted { instance_id }).await;
                    return Ok(instance);
                }
                StepOutcome::Suspended => {
                    instance.status = InstanceStatus::Waiting;
                    instance = self.instances.save(&instance).await?;
                    tracing::info!(%instance_id, step_id = %current_step_id, "instance suspended, awaiting resume");
                    return Ok(instance);
                }
                StepOutcome::Failed(error) => {
                    instance.status = InstanceStatus::Failed;
                    instance.last_error = Some(error.clone());
                    instance.completed_at = Some(self.clock.now());
                    instance = self.instances.save(&instance).await?;
                    tracing::warn!(%instance_id, error_code = %error.code, "instance failed");
                    publish_workflow_event(
                        &self.publisher,
                        &WorkflowEvent::InstanceFailed {
                            instance_id,
                            error: serde_json::to_value(&error).unwrap_or(Value::Null),
                        },
                    )
                    .await;
                    return Ok(instance);
                }
                StepOutcome::Advance(next_step_id) => {
                    tracing::debug!(%instance_id, from = %current_step_id, to = ?next_step_id, "transition taken");
                    instance.current_step_id = next_step_id;
                    instance = self.instances.save(&instance).await?;
                }
            }

            if let Some(cancelled) = self.observe_cancellation(organization_id, instance_id).await? {
                tracing::info!(%instance_id, "instance cancelled, observed at step boundary");
                return Ok(cancelled);
            }

            if instance.current_step_id.is_none() {
                instance.status = InstanceStatus::Completed;
                instance.completed_at = Some(self.clock.now());
                instance = self.instances.save(&instance).await?;
                tracing::info!(%instance_id, "instance completed");
                publish_workflow_event(&self.publisher, &WorkflowEvent::InstanceCompleted { instance_id }).await;
                return Ok(instance);
            }
        }

        if instance.status != InstanceStatus::Completed && instance.status != InstanceStatus::Failed {
            instance.status = InstanceStatus::Completed;
            instance.completed_at = Some(self.clock.now());
            instance = self.instances.save(&instance).await?;
            publish_workflow_event(&self.publisher, &WorkflowEvent::InstanceCompleted { instance_id }).await;
        }
        Ok(instance)
    }

    /// Run one step to completion, including in-loop retries (§4.4 step g),
    /// and decide what the outer loop should do next.
    async fn run_step(&self, instance: &mut WorkflowInstance, step: &WorkflowStep) -> StepOutcome {
        let mut retry_count = 0u32;

        loop {
            let ctx = build_context(instance);
            let started_at = self.clock.now();
            let result = match self.dispatcher.dispatch(step, &ctx).await {
                Ok(result) => result,
                Err(_) => crate::executor::types::StepResult::failure(
                    ErrorInfo::new("STEP_EXECUTION_ERROR", "step dispatch failed").with_step(step.id.clone()),
                ),
            };
            let completed_at = self.clock.now();

            let mut execution = StepExecution {
                step_id: step.id.clone(),
                step_name: step.name.clone(),
                step_type: step.kind.label().to_string(),
                status: if result.success { StepExecutionStatus::Completed } else { StepExecutionStatus::Failed },
                started_at,
                completed_at: Some(completed_at),
                input: Value::Object(ctx.variables.clone()),
                output: result.output.clone(),
                error: result.error.clone(),
                retry_count,
                duration_ms: Some((completed_at - started_at).num_milliseconds()),
            };

            if let Some(updates) = &result.variable_updates {
                instance.merge_variables(updates);
            }

            if result.success {
                instance.mark_step_completed(&step.id);
                instance.step_executions.push(execution);

                if result.should_terminate {
                    return StepOutcome::Terminated;
                }
                if result.requires_orchestration_flag() {
                    if let Some(outcome) = self.handle_orchestration(step, &result).await {
                        return outcome;
                    }
                }
                let next = determine_next_step(step, &result, instance);
                return StepOutcome::Advance(next);
            }

            // Failure: consult onError policy (§4.4 step g).
            let error = execution.error.clone().unwrap_or_else(|| ErrorInfo::new("STEP_EXECUTION_ERROR", "unknown error"));
            let Some(policy) = &step.on_error else {
                instance.step_executions.push(execution);
                return StepOutcome::Failed(error.with_step(step.id.clone()));
            };

            match policy.action {
                ErrorAction::Skip => {
                    execution.status = StepExecutionStatus::Skipped;
                    instance.mark_step_completed(&step.id);
                    instance.step_executions.push(execution);
                    let next = determine_next_step(step, &result, instance);
                    return StepOutcome::Advance(next);
                }
                ErrorAction::Goto => {
                    instance.step_executions.push(execution);
                    return StepOutcome::Advance(policy.fallback_step_id.clone());
                }
                ErrorAction::Compensate | ErrorAction::Fail => {
                    instance.step_executions.push(execution);
                    return StepOutcome::Failed(error.with_step(step.id.clone()));
                }
                ErrorAction::Retry => {
                    let Some(retry_policy) = &policy.retry_policy else {
                        instance.step_executions.push(execution);
                        return StepOutcome::Failed(error.with_step(step.id.clone()));
                    };
                    let retryable = retry_policy
                        .retryable_errors
                        .as_ref()
                        .map_or(true, |codes| codes.iter().any(|c| c == &error.code));

                    if retry_count + 1 >= retry_policy.max_attempts || !retryable {
                        instance.step_executions.push(execution);
                        return StepOutcome::Failed(error.with_step(step.id.clone()));
                    }

                    instance.step_executions.push(execution);
                    let delay = compute_backoff_delay(retry_policy, retry_count);
                    tracing::debug!(step_id = %step.id, retry_count, delay_seconds = delay, "retry scheduled");
                    if delay > 0 {
                        tokio::time::sleep(std::time::Duration::from_secs(delay)).await;
                    }
                    retry_count += 1;
                }
            }
        }
    }

    /// Kinds whose `StepResult` requires the orchestrator to act specially
    /// (§4.4 step i). Returns `Some(outcome)` to stop the loop, `None` to
    /// keep advancing normally (reserved kinds: no-op advance per §9).
    async fn handle_orchestration(
        &self,
        step: &WorkflowStep,
        result: &crate::executor::types::StepResult,
    ) -> Option<StepOutcome> {
        let step_type = result.output.as_ref().and_then(|o| o.get("stepType")).and_then(Value::as_str);
        match step_type {
            Some("wait" | "human") => Some(StepOutcome::Suspended),
            Some("delay") => {
                let seconds = result
                    .output
                    .as_ref()
                    .and_then(|o| o.get("delaySeconds"))
                    .and_then(Value::as_i64)
                    .unwrap_or(0)
                    .max(0) as u64;
                if seconds > 0 {
                    tokio::time::sleep(std::time::Duration::from_secs(seconds)).await;
                }
                None
            }
            // parallel/loop/subworkflow: reserved, no-op advance (§9).
            _ => {
                let _ = step;
                None
            }
        }
    }

    /// `resumeWorkflow(instanceId, eventData?)` (§4.4).
    pub async fn resume_workflow(
        &self,
        organization_id: OrganizationId,
        instance_id: InstanceId,
        event_data: Option<Value>,
    ) -> Result<WorkflowInstance, OrchestratorError> {
        let mut instance = self.instances.get(organization_id, instance_id).await?;
        if !matches!(instance.status, InstanceStatus::Waiting | InstanceStatus::Paused) {
            return Err(OrchestratorError::InvalidState(format!(
                "instance {instance_id} is {:?}, not waiting or paused",
                instance.status
            )));
        }
        instance.status = InstanceStatus::Running;
        if let Some(data) = event_data {
            instance.variables.insert("eventData".to_string(), data);
        }
        self.instances.save(&instance).await?;
        self.execute_workflow(organization_id, instance_id).await
    }

    /// `cancelInstance(instanceId)` (§4.7, §5 "Cancellation and timeout"):
    /// user-initiated, always idempotent — cancelling an already-terminal
    /// instance is absorbed as a no-op rather than an error.
    pub async fn cancel_instance(
        &self,
        organization_id: OrganizationId,
        instance_id: InstanceId,
    ) -> Result<WorkflowInstance, OrchestratorError> {
        let mut instance = self.instances.get(organization_id, instance_id).await?;
        if instance.status.is_terminal() {
            return Ok(instance);
        }
        instance.status = InstanceStatus::Cancelled;
        instance.last_error = Some(ErrorInfo::new("CANCELLED", "instance cancelled"));
        instance.completed_at = Some(self.clock.now());
        instance = self.instances.save(&instance).await?;
        tracing::info!(%instance_id, "instance cancelled");
        publish_workflow_event(&self.publisher, &WorkflowEvent::InstanceCancelled { instance_id }).await;
        Ok(instance)
    }

    /// Re-reads the persisted instance and returns it if another writer
    /// (e.g. a concurrent `cancel_instance` call) has since flipped it to
    /// `Cancelled` — the durable-boundary check §5 requires at step start
    /// and step completion.
    async fn observe_cancellation(
        &self,
        organization_id: OrganizationId,
        instance_id: InstanceId,
    ) -> Result<Option<WorkflowInstance>, OrchestratorError> {
        let current = self.instances.get(organization_id, instance_id).await?;
        Ok((current.status == InstanceStatus::Cancelled).then_some(current))
    }
}

enum StepOutcome {
    Advance(Option<String>),
    Suspended,
    Terminated,
    Failed(ErrorInfo),
}

fn build_context(instance: &WorkflowInstance) -> ExpressionContext {
    let mut step_outputs = Map::new();
    for execution in &instance.step_executions {
        if execution.status == StepExecutionStatus::Completed {
            if let Some(output) = &execution.output {
                step_outputs.insert(execution.step_id.clone(), output.clone());
            }
        }
    }
    ExpressionContext::new(instance.variables.clone(), step_outputs, instance.trigger_data.clone())
}

/// `determineNextStep(step, steps, ctx, result)` (§4.4 step j): a step
/// result's own `nextStepId` wins (decision steps set this); otherwise fall
/// back to `findMatchingTransition` over the step's own `transitions`.
fn determine_next_step(
    step: &WorkflowStep,
    result: &crate::executor::types::StepResult,
    instance: &WorkflowInstance,
) -> Option<String> {
    if let Some(next) = &result.next_step_id {
        return Some(next.clone());
    }
    let ctx = build_context(instance);
    find_matching_transition(&step.transitions, &ctx).map(str::to_string)
}

fn compute_backoff_delay(retry_policy: &strata_domain::step::RetryPolicy, retry_count: u32) -> u64 {
    let delay = match retry_policy.backoff_type {
        BackoffType::Fixed => retry_policy.initial_delay_seconds,
        BackoffType::Exponential => retry_policy.initial_delay_seconds.saturating_mul(2u64.saturating_pow(retry_count)),
    };
    retry_policy.max_delay_seconds.map_or(delay, |max| delay.min(max))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::logging_publisher;
    use crate::repository::{DefinitionRepository, InstanceRepository};
    use crate::store::InMemoryStore;
    use serde_json::json;
    use std::collections::HashMap;
    use strata_common::clock::system_clock;
    use strata_domain::condition::{ConditionExpression, SimpleOperator};
    use strata_domain::definition::{DefinitionStatus, WorkflowDefinition};
    use strata_domain::ids::WorkflowId;
    use strata_domain::step::{
        ActionConfig, ActionType, DecisionConfig, OnErrorPolicy, RetryPolicy, SetVariableConfig, StepKind,
        TransitionRule,
    };

    fn setup() -> (Orchestrator, DefinitionRepository, InstanceRepository, OrganizationId) {
        let store: Arc<dyn crate::store::Store> = Arc::new(InMemoryStore::new());
        let definitions = DefinitionRepository::new(store.clone());
        let instances = InstanceRepository::new(store.clone());
        let dispatcher = StepDispatcher::new(reqwest::Client::new(), logging_publisher(), store.clone());
        let orchestrator = Orchestrator::new(
            DefinitionRepository::new(store.clone()),
            InstanceRepository::new(store.clone()),
            dispatcher,
            logging_publisher(),
            system_clock(),
        );
        (orchestrator, definitions, instances, OrganizationId::new())
    }

    fn base_definition(workflow_id: WorkflowId, org: OrganizationId, steps: Vec<WorkflowStep>) -> WorkflowDefinition {
        WorkflowDefinition {
            workflow_id,
            version: 1,
            name: "test".to_string(),
            description: None,
            status: DefinitionStatus::Active,
            organization_id: org,
            triggers: vec![],
            steps,
            variable_schema: HashMap::new(),
            settings: strata_domain::common::WorkflowSettings::default(),
            tags: vec![],
            category: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            created_by: None,
            is_deleted: false,
        }
    }

    fn base_instance(workflow_id: WorkflowId, org: OrganizationId) -> WorkflowInstance {
        WorkflowInstance {
            instance_id: InstanceId::new(),
            workflow_id,
            workflow_version: 1,
            organization_id: org,
            trigger_id: None,
            trigger_type: None,
            trigger_data: Value::Null,
            status: InstanceStatus::Pending,
            current_step_id: None,
            step_executions: vec![],
            variables: {
                let mut m = Map::new();
                m.insert("name".to_string(), json!("Ada"));
                m
            },
            completed_step_ids: vec![],
            correlation_id: None,
            parent_instance_id: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            last_error: None,
            initiated_by: None,
            activity_log: vec![],
            current_stage: None,
            progress_percent: None,
            version: 0,
        }
    }

    fn step(id: &str, order: i64, kind: StepKind, transitions: Vec<TransitionRule>) -> WorkflowStep {
        WorkflowStep {
            id: id.to_string(),
            name: id.to_string(),
            kind,
            order,
            is_enabled: true,
            transitions,
            on_error: None,
            timeout_seconds: None,
        }
    }

    #[tokio::test]
    async fn scenario_a_simple_linear_flow() {
        let (orchestrator, definitions, instances, org) = setup();
        let workflow_id = WorkflowId::new();
        let steps = vec![
            step(
                "s1",
                0,
                StepKind::SetVariable(SetVariableConfig {
                    variables: json!({"greeting": "Hello, {{$.name}}!"}),
                }),
                vec![TransitionRule { target_step_id: "s2".to_string(), condition: None, is_default: None, priority: None }],
            ),
            step("s2", 1, StepKind::Terminate, vec![]),
        ];
        definitions.save(&base_definition(workflow_id, org, steps)).await.unwrap();
        let mut instance = base_instance(workflow_id, org);
        instance.current_step_id = Some("s1".to_string());
        let saved = instances.save(&instance).await.unwrap();

        let result = orchestrator.execute_workflow(org, saved.instance_id).await.unwrap();
        assert_eq!(result.status, InstanceStatus::Completed);
        assert_eq!(result.variables.get("greeting").unwrap(), "Hello, Ada!");
        assert_eq!(result.completed_step_ids, vec!["s1", "s2"]);
    }

    #[tokio::test]
    async fn scenario_b_decision_branch() {
        let (orchestrator, definitions, instances, org) = setup();
        let workflow_id = WorkflowId::new();
        let steps = vec![
            step(
                "d",
                0,
                StepKind::Decision(DecisionConfig {
                    conditions: vec![
                        TransitionRule {
                            target_step_id: "highPath".to_string(),
                            condition: Some(ConditionExpression::Simple {
                                left: "$.amount".to_string(),
                                operator: SimpleOperator::Gt,
                                right: Some(json!(1000)),
                            }),
                            is_default: None,
                            priority: None,
                        },
                        TransitionRule { target_step_id: "lowPath".to_string(), condition: None, is_default: Some(true), priority: None },
                    ],
                }),
                vec![],
            ),
            step("highPath", 1, StepKind::Terminate, vec![]),
            step("lowPath", 2, StepKind::Terminate, vec![]),
        ];
        definitions.save(&base_definition(workflow_id, org, steps)).await.unwrap();
        let mut instance = base_instance(workflow_id, org);
        instance.variables.insert("amount".to_string(), json!(1500));
        instance.current_step_id = Some("d".to_string());
        let saved = instances.save(&instance).await.unwrap();

        let result = orchestrator.execute_workflow(org, saved.instance_id).await.unwrap();
        assert!(result.completed_step_ids.contains(&"highPath".to_string()));
        assert!(!result.completed_step_ids.contains(&"lowPath".to_string()));
    }

    #[tokio::test]
    async fn scenario_c_retry_exhaustion() {
        let mock_server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/always-fails"))
            .respond_with(wiremock::ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let (orchestrator, definitions, instances, org) = setup();
        let workflow_id = WorkflowId::new();
        let steps = vec![step(
            "h",
            0,
            StepKind::Action(ActionConfig {
                action_type: ActionType::HttpRequest,
                output_variable: None,
                settings: json!({"url": format!("{}/always-fails", mock_server.uri()), "method": "GET"}),
            }),
            vec![],
        )];
        definitions.save(&base_definition(workflow_id, org, steps.into_iter().map(|mut s| {
            s.on_error = Some(OnErrorPolicy {
                action: ErrorAction::Retry,
                retry_policy: Some(RetryPolicy {
                    max_attempts: 3,
                    backoff_type: BackoffType::Fixed,
                    initial_delay_seconds: 0,
                    max_delay_seconds: None,
                    retryable_errors: None,
                }),
                fallback_step_id: None,
            });
            s
        }).collect())).await.unwrap();
        let mut instance = base_instance(workflow_id, org);
        instance.current_step_id = Some("h".to_string());
        let saved = instances.save(&instance).await.unwrap();

        let result = orchestrator.execute_workflow(org, saved.instance_id).await.unwrap();
        assert_eq!(result.status, InstanceStatus::Failed);
        let last_error = result.last_error.unwrap();
        assert_eq!(last_error.step_id.as_deref(), Some("h"));
        assert!(last_error.code.starts_with("HTTP_5"), "expected an HTTP_5xx code, got {}", last_error.code);
        let h_executions: Vec<_> = result.step_executions.iter().filter(|e| e.step_id == "h").collect();
        assert_eq!(h_executions.last().unwrap().retry_count, 2);
    }

    #[tokio::test]
    async fn cancel_instance_flips_status_and_records_error() {
        let (orchestrator, definitions, instances, org) = setup();
        let workflow_id = WorkflowId::new();
        let steps = vec![step("s1", 0, StepKind::Terminate, vec![])];
        definitions.save(&base_definition(workflow_id, org, steps)).await.unwrap();
        let mut instance = base_instance(workflow_id, org);
        instance.status = InstanceStatus::Running;
        instance.current_step_id = Some("s1".to_string());
        let saved = instances.save(&instance).await.unwrap();

        let cancelled = orchestrator.cancel_instance(org, saved.instance_id).await.unwrap();
        assert_eq!(cancelled.status, InstanceStatus::Cancelled);
        assert_eq!(cancelled.last_error.unwrap().code, "CANCELLED");

        // Idempotent: cancelling an already-terminal instance is a no-op, not an error.
        let again = orchestrator.cancel_instance(org, saved.instance_id).await.unwrap();
        assert_eq!(again.status, InstanceStatus::Cancelled);
    }

    #[tokio::test]
    async fn execute_workflow_stops_when_cancelled_mid_run() {
        let (orchestrator, definitions, instances, org) = setup();
        let workflow_id = WorkflowId::new();
        let steps = vec![
            step(
                "s1",
                0,
                StepKind::SetVariable(SetVariableConfig { variables: json!({"touched": true}) }),
                vec![TransitionRule { target_step_id: "s2".to_string(), condition: None, is_default: None, priority: None }],
            ),
            step("s2", 1, StepKind::Terminate, vec![]),
        ];
        definitions.save(&base_definition(workflow_id, org, steps)).await.unwrap();
        let mut instance = base_instance(workflow_id, org);
        instance.current_step_id = Some("s1".to_string());
        let saved = instances.save(&instance).await.unwrap();

        orchestrator.cancel_instance(org, saved.instance_id).await.unwrap();

        let result = orchestrator.execute_workflow(org, saved.instance_id).await.unwrap();
        assert_eq!(result.status, InstanceStatus::Cancelled);
        assert!(result.completed_step_ids.is_empty());
    }
}
