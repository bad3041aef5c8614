//! The privileged `script` step (§4.3 supplement): a sandboxed JavaScript
//! snippet evaluated against `vars`/`steps`/`input`, with `Math` and
//! `JSON.parse`/`JSON.stringify` available and nothing else — no filesystem,
//! network, or process access, since `boa_engine` is a pure-Rust interpreter
//! with no such bindings to begin with.

use boa_engine::{Context, JsResult, JsValue, Source};
use serde_json::Value;
use std::time::Duration;
use strata_domain::common::ErrorInfo;
use tokio::task;

use crate::expression::ExpressionContext;

const DEFAULT_TIMEOUT_SECONDS: u64 = 5;

/// Run `source` with `ctx`'s variables/step-outputs/input injected as
/// globals, racing a wall-clock timeout (§4.3: "timeout, default 5 s").
pub async fn run_script(
    source: &str,
    ctx: &ExpressionContext,
    timeout_seconds: Option<u64>,
) -> Result<Value, ErrorInfo> {
    let timeout = Duration::from_secs(timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS));
    let source = source.to_string();
    let vars = Value::Object(ctx.variables.clone());
    let step_outputs = Value::Object(ctx.step_outputs.clone());
    let input = ctx.input.clone();

    let handle = task::spawn_blocking(move || evaluate_sync(&source, &vars, &step_outputs, &input));

    match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(result)) => result,
        Ok(Err(_join_error)) => Err(ErrorInfo::new("SCRIPT_ERROR", "script task panicked")),
        Err(_elapsed) => Err(ErrorInfo::new("SCRIPT_TIMEOUT", "script exceeded its timeout")),
    }
}

fn evaluate_sync(source: &str, vars: &Value, step_outputs: &Value, input: &Value) -> Result<Value, ErrorInfo> {
    let mut context = Context::default();

    inject_global(&mut context, "vars", vars)
        .map_err(|e| ErrorInfo::new("SCRIPT_ERROR", format!("failed to inject vars: {e}")))?;
    inject_global(&mut context, "steps", step_outputs)
        .map_err(|e| ErrorInfo::new("SCRIPT_ERROR", format!("failed to inject steps: {e}")))?;
    inject_global(&mut context, "input", input)
        .map_err(|e| ErrorInfo::new("SCRIPT_ERROR", format!("failed to inject input: {e}")))?;

    let result = context
        .eval(Source::from_bytes(source))
        .map_err(|e| ErrorInfo::new("SCRIPT_ERROR", e.to_string()))?;

    js_value_to_json(&result, &mut context)
        .map_err(|e| ErrorInfo::new("SCRIPT_ERROR", format!("failed to read script result: {e}")))
}

fn inject_global(context: &mut Context, name: &str, value: &Value) -> JsResult<()> {
    let js_value = json_to_js_value(value, context)?;
    context.register_global_property(
        boa_engine::js_string!(name.to_string()),
        js_value,
        boa_engine::property::Attribute::all(),
    )?;
    Ok(())
}

fn json_to_js_value(value: &Value, context: &mut Context) -> JsResult<JsValue> {
    let json_text = serde_json::to_string(value).unwrap_or_else(|_| "null".to_string());
    context.eval(Source::from_bytes(&format!("({json_text})")))
}

fn js_value_to_json(value: &JsValue, context: &mut Context) -> JsResult<Value> {
    let json_global = context
        .global_object()
        .get(boa_engine::js_string!("JSON"), context)?;
    let stringify = json_global
        .as_object()
        .and_then(|obj| obj.get(boa_engine::js_string!("stringify"), context).ok())
        .and_then(|v| v.as_callable().cloned());

    let Some(stringify) = stringify else {
        return Ok(Value::Null);
    };
    let stringified = stringify.call(&json_global, &[value.clone()], context)?;
    let Some(text) = stringified.as_string() else {
        return Ok(Value::Null);
    };
    let text = text.to_std_string_escaped();
    Ok(serde_json::from_str(&text).unwrap_or(Value::Null))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    #[tokio::test]
    async fn script_reads_injected_vars() {
        let mut vars = Map::new();
        vars.insert("amount".to_string(), json!(42));
        let ctx = ExpressionContext::new(vars, Map::new(), Value::Null);
        let result = run_script("vars.amount * 2", &ctx, None).await.unwrap();
        assert_eq!(result, json!(84));
    }

    #[tokio::test]
    async fn script_can_use_math_and_json() {
        let ctx = ExpressionContext::new(Map::new(), Map::new(), Value::Null);
        let result = run_script("JSON.stringify({ rounded: Math.round(3.6) })", &ctx, None)
            .await
            .unwrap();
        assert_eq!(result, json!("{\"rounded\":4}"));
    }

    #[tokio::test]
    async fn script_syntax_error_is_script_error() {
        let ctx = ExpressionContext::new(Map::new(), Map::new(), Value::Null);
        let err = run_script("(((", &ctx, None).await.unwrap_err();
        assert_eq!(err.code, "SCRIPT_ERROR");
    }

    #[tokio::test]
    async fn script_timeout_is_enforced() {
        let ctx = ExpressionContext::new(Map::new(), Map::new(), Value::Null);
        let err = run_script("while (true) {}", &ctx, Some(1)).await.unwrap_err();
        assert_eq!(err.code, "SCRIPT_TIMEOUT");
    }
}
