//! The step kinds that don't need an `ActionExecutor` or the script engine:
//! `setVariable`, `delay`, `terminate`, `decision`, `wait`, `transform`.

use serde_json::{Map, Value};
use strata_domain::step::{DecisionConfig, SetVariableConfig, TransformConfig, WaitConfig};

use crate::condition::find_matching_transition;
use crate::expression::{resolve_object, ExpressionContext};
use crate::expression::transform;

use super::types::StepResult;

/// `setVariable` (§4.3): every entry is resolved against the current
/// context, then written to both the output and the variable updates.
#[must_use]
pub fn execute_set_variable(config: &SetVariableConfig, ctx: &ExpressionContext) -> StepResult {
    let resolved = resolve_object(&config.variables, ctx);
    let Value::Object(map) = resolved.clone() else {
        return StepResult::success(resolved);
    };
    StepResult::success(Value::Object(map.clone())).with_variable_updates(map)
}

/// `delay` (§4.3): the orchestrator owns actually waiting; this just emits
/// the orchestration request.
#[must_use]
pub fn execute_delay(delay_seconds: i64) -> StepResult {
    StepResult::requires_orchestration("delay", serde_json::json!({ "delaySeconds": delay_seconds }))
}

/// `terminate` (§4.3): ends the instance as completed regardless of further
/// transitions.
#[must_use]
pub fn execute_terminate() -> StepResult {
    StepResult::terminate()
}

/// `decision` (§4.2/§4.3): run the same transition-selection logic used for
/// a step's own `transitions`, but over this step's `conditions` list.
#[must_use]
pub fn execute_decision(config: &DecisionConfig, ctx: &ExpressionContext) -> StepResult {
    let matched = find_matching_transition(&config.conditions, ctx);
    let mut output = Map::new();
    output.insert(
        "matchedTransition".to_string(),
        matched.map_or(Value::Null, |id| Value::String(id.to_string())),
    );
    let result = StepResult::success(Value::Object(output));
    match matched {
        Some(step_id) => result.with_next_step(step_id),
        None => result,
    }
}

/// `wait` (§4.3): pure acknowledgement; the orchestrator parks the instance.
#[must_use]
pub fn execute_wait(config: &WaitConfig) -> StepResult {
    StepResult::requires_orchestration(
        "wait",
        serde_json::json!({ "waitType": config.wait_type, "settings": config.settings }),
    )
}

/// `transform` (§4.1/§4.3): evaluate the transform expression language and
/// store the result under `outputVariable`.
#[must_use]
pub fn execute_transform(config: &TransformConfig, ctx: &ExpressionContext) -> StepResult {
    let value = transform::evaluate(&config.expression, ctx);
    let mut updates = Map::new();
    updates.insert(config.output_variable.clone(), value.clone());
    let mut output = Map::new();
    output.insert(config.output_variable.clone(), value);
    StepResult::success(Value::Object(output)).with_variable_updates(updates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_domain::condition::{ConditionExpression, SimpleOperator};
    use strata_domain::step::TransitionRule;

    fn ctx() -> ExpressionContext {
        ExpressionContext::new(Map::new(), Map::new(), Value::Null)
    }

    #[test]
    fn set_variable_resolves_literal_map() {
        let config = SetVariableConfig {
            variables: serde_json::json!({"greeting": "hi"}),
        };
        let result = execute_set_variable(&config, &ctx());
        assert!(result.success);
        assert_eq!(result.variable_updates.unwrap()["greeting"], "hi");
    }

    #[test]
    fn delay_requires_orchestration_with_seconds() {
        let result = execute_delay(30);
        assert!(result.requires_orchestration_flag());
        assert_eq!(result.output.unwrap()["delaySeconds"], 30);
    }

    #[test]
    fn terminate_sets_should_terminate() {
        assert!(execute_terminate().should_terminate);
    }

    #[test]
    fn decision_falls_back_to_default() {
        let config = DecisionConfig {
            conditions: vec![TransitionRule {
                target_step_id: "default".to_string(),
                condition: None,
                is_default: Some(true),
                priority: None,
            }],
        };
        let result = execute_decision(&config, &ctx());
        assert_eq!(result.next_step_id.as_deref(), Some("default"));
    }

    #[test]
    fn decision_with_no_match_has_no_next_step() {
        let config = DecisionConfig {
            conditions: vec![TransitionRule {
                target_step_id: "unreached".to_string(),
                condition: Some(ConditionExpression::Simple {
                    left: "$.missing".to_string(),
                    operator: SimpleOperator::Exists,
                    right: None,
                }),
                is_default: None,
                priority: None,
            }],
        };
        let result = execute_decision(&config, &ctx());
        assert!(result.next_step_id.is_none());
    }
}
