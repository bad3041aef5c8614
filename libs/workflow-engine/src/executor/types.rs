//! Uniform `StepResult` shape (§4.3) returned by every step kind.

use serde_json::{Map, Value};
use strata_domain::common::ErrorInfo;

#[derive(Debug, Clone, Default)]
pub struct StepResult {
    pub success: bool,
    pub output: Option<Value>,
    pub error: Option<ErrorInfo>,
    pub next_step_id: Option<String>,
    pub should_terminate: bool,
    pub variable_updates: Option<Map<String, Value>>,
}

impl StepResult {
    #[must_use]
    pub fn success(output: Value) -> Self {
        Self {
            success: true,
            output: Some(output),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn failure(error: ErrorInfo) -> Self {
        Self {
            success: false,
            error: Some(error),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_variable_updates(mut self, updates: Map<String, Value>) -> Self {
        self.variable_updates = Some(updates);
        self
    }

    #[must_use]
    pub fn with_next_step(mut self, step_id: impl Into<String>) -> Self {
        self.next_step_id = Some(step_id.into());
        self
    }

    #[must_use]
    pub fn terminate() -> Self {
        Self {
            success: true,
            should_terminate: true,
            ..Default::default()
        }
    }

    /// A step whose kind requires the orchestrator itself to act (`wait`,
    /// `delay`, `human`, `parallel`, `loop`, `subworkflow`, `retry`,
    /// `compensate`): `output.requiresOrchestration = true` per §4.3.
    #[must_use]
    pub fn requires_orchestration(step_type: &str, extra: Value) -> Self {
        let mut output = Map::new();
        output.insert("requiresOrchestration".to_string(), Value::Bool(true));
        output.insert("stepType".to_string(), Value::String(step_type.to_string()));
        if let Value::Object(extra_map) = extra {
            for (k, v) in extra_map {
                output.insert(k, v);
            }
        }
        Self {
            success: true,
            output: Some(Value::Object(output)),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn requires_orchestration_flag(&self) -> bool {
        self.output
            .as_ref()
            .and_then(|o| o.get("requiresOrchestration"))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}
