//! The per-execution expression context `{variables, stepOutputs, input, env}` (§4.1).

use serde_json::{Map, Value};
use std::collections::HashMap;

/// Bundle of everything an expression or condition may read.
///
/// `env` is an explicit injected map rather than a direct `std::env::var`
/// call (§9: "the evaluator's environment access is likewise an injected
/// map"), so tests can substitute fakes.
#[derive(Debug, Clone, Default)]
pub struct ExpressionContext {
    pub variables: Map<String, Value>,
    /// Keyed by `stepId`, only completed steps (§4.4 step c).
    pub step_outputs: Map<String, Value>,
    pub input: Value,
    pub env: HashMap<String, String>,
}

impl ExpressionContext {
    #[must_use]
    pub fn new(variables: Map<String, Value>, step_outputs: Map<String, Value>, input: Value) -> Self {
        Self {
            variables,
            step_outputs,
            input,
            env: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }
}
