//! `{{ expr }}` template evaluation and deep-object substitution (§4.1).

use serde_json::Value;

use super::builtins;
use super::context::ExpressionContext;
use super::path::resolve_path;

/// Evaluate a single bare expression (the content of one `{{ ... }}`, or a
/// builtin argument). Returns `None` when unresolved — never an error.
#[must_use]
pub fn eval_expr(expr: &str, ctx: &ExpressionContext) -> Option<Value> {
    let expr = expr.trim();

    if let Some(rest) = expr.strip_prefix("fn.") {
        return eval_call(rest, ctx);
    }
    if let Some(rest) = expr.strip_prefix("$.") {
        let root = Value::Object(ctx.variables.clone());
        return resolve_path(rest, &root).cloned();
    }
    if expr == "$" {
        return Some(Value::Object(ctx.variables.clone()));
    }
    if let Some(rest) = expr.strip_prefix("steps.") {
        let (step_id, path) = split_first_segment(rest);
        let step_value = ctx.step_outputs.get(step_id)?;
        return if path.is_empty() {
            Some(step_value.clone())
        } else {
            resolve_path(path, step_value).cloned()
        };
    }
    if expr == "input" {
        return Some(ctx.input.clone());
    }
    if let Some(rest) = expr.strip_prefix("input.") {
        return resolve_path(rest, &ctx.input).cloned();
    }
    if let Some(name) = expr.strip_prefix("env.") {
        return ctx.env.get(name).cloned().map(Value::String);
    }
    if let Some(literal) = parse_quoted(expr) {
        return Some(Value::String(literal));
    }
    parse_literal(expr)
}

fn eval_call(rest: &str, ctx: &ExpressionContext) -> Option<Value> {
    let open = rest.find('(')?;
    if !rest.ends_with(')') {
        return None;
    }
    let name = &rest[..open];
    let arg_str = &rest[open + 1..rest.len() - 1];
    let args: Vec<Option<Value>> = split_args(arg_str)
        .iter()
        .map(|a| eval_expr(a, ctx))
        .collect();
    builtins::call(name, &args)
}

/// Split `"a", fn.x(b, c), $.d"` into top-level comma-separated argument
/// strings, respecting nested parentheses and quoted strings (§4.1
/// "Argument parsing").
fn split_args(s: &str) -> Vec<&str> {
    if s.trim().is_empty() {
        return Vec::new();
    }
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut in_quote: Option<char> = None;
    let mut start = 0usize;
    for (i, ch) in s.char_indices() {
        match ch {
            '\'' | '"' => {
                if in_quote == Some(ch) {
                    in_quote = None;
                } else if in_quote.is_none() {
                    in_quote = Some(ch);
                }
            }
            '(' if in_quote.is_none() => depth += 1,
            ')' if in_quote.is_none() => depth -= 1,
            ',' if in_quote.is_none() && depth == 0 => {
                parts.push(s[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(s[start..].trim());
    parts
}

fn split_first_segment(s: &str) -> (&str, &str) {
    s.find('.').map_or((s, ""), |idx| (&s[..idx], &s[idx + 1..]))
}

fn parse_quoted(s: &str) -> Option<String> {
    let bytes = s.as_bytes();
    if bytes.len() >= 2 {
        let quote = bytes[0];
        if (quote == b'\'' || quote == b'"') && bytes[bytes.len() - 1] == quote {
            return Some(s[1..s.len() - 1].to_string());
        }
    }
    None
}

fn parse_literal(s: &str) -> Option<Value> {
    match s {
        "true" => return Some(Value::Bool(true)),
        "false" => return Some(Value::Bool(false)),
        "null" => return Some(Value::Null),
        _ => {}
    }
    s.parse::<f64>().ok().map(|n| {
        serde_json::Number::from_f64(n).map_or(Value::Null, Value::Number)
    })
}

const TEMPLATE_OPEN: &str = "{{";
const TEMPLATE_CLOSE: &str = "}}";

/// Is `s` a single bare `{{ ... }}` template with nothing else around it?
fn as_sole_template(s: &str) -> Option<&str> {
    let trimmed = s.trim();
    let inner = trimmed
        .strip_prefix(TEMPLATE_OPEN)?
        .strip_suffix(TEMPLATE_CLOSE)?;
    if inner.contains(TEMPLATE_OPEN) {
        return None;
    }
    Some(inner)
}

/// Resolve one string value: a sole `{{ }}` preserves the resolved type; a
/// string with embedded `{{ }}` occurrences gets each one stringified and
/// spliced in, with unresolved splices substituting the empty string.
#[must_use]
pub fn resolve_string(s: &str, ctx: &ExpressionContext) -> Value {
    if let Some(inner) = as_sole_template(s) {
        return eval_expr(inner, ctx).unwrap_or(Value::Null);
    }

    if !s.contains(TEMPLATE_OPEN) {
        return Value::String(s.to_string());
    }

    let mut out = String::new();
    let mut rest = s;
    while let Some(start) = rest.find(TEMPLATE_OPEN) {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + TEMPLATE_OPEN.len()..];
        if let Some(end) = after_open.find(TEMPLATE_CLOSE) {
            let inner = &after_open[..end];
            let resolved = eval_expr(inner, ctx);
            out.push_str(&resolved.map_or_else(String::new, |v| stringify_for_splice(&v)));
            rest = &after_open[end + TEMPLATE_CLOSE.len()..];
        } else {
            out.push_str(TEMPLATE_OPEN);
            rest = after_open;
        }
    }
    out.push_str(rest);
    Value::String(out)
}

fn stringify_for_splice(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Recursive-descent object resolution (§4.1): arrays and objects are
/// walked, strings pass through [`resolve_string`], and every other leaf is
/// preserved unchanged.
#[must_use]
pub fn resolve_object(value: &Value, ctx: &ExpressionContext) -> Value {
    match value {
        Value::String(s) => resolve_string(s, ctx),
        Value::Array(items) => Value::Array(items.iter().map(|v| resolve_object(v, ctx)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), resolve_object(v, ctx)))
                .collect(),
        ),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn ctx() -> ExpressionContext {
        let mut vars = Map::new();
        vars.insert("name".to_string(), json!("Ada"));
        vars.insert("amount".to_string(), json!(1500));
        let mut steps = Map::new();
        steps.insert("s1".to_string(), json!({"total": 42}));
        ExpressionContext::new(vars, steps, json!({"leadId": "L7"}))
    }

    #[test]
    fn sole_template_preserves_type() {
        let result = resolve_string("{{ $.amount }}", &ctx());
        assert_eq!(result, json!(1500));
    }

    #[test]
    fn embedded_template_stringifies() {
        let result = resolve_string("Hello, {{$.name}}!", &ctx());
        assert_eq!(result, json!("Hello, Ada!"));
    }

    #[test]
    fn unresolved_splices_empty_string() {
        let result = resolve_string("X={{$.missing}}Y", &ctx());
        assert_eq!(result, json!("XY"));
    }

    #[test]
    fn step_output_path() {
        let result = resolve_string("{{steps.s1.total}}", &ctx());
        assert_eq!(result, json!(42));
    }

    #[test]
    fn input_path() {
        let result = resolve_string("{{input.leadId}}", &ctx());
        assert_eq!(result, json!("L7"));
    }

    #[test]
    fn builtin_call_with_nested_args() {
        let result = resolve_string("{{fn.upper($.name)}}", &ctx());
        assert_eq!(result, json!("ADA"));
    }

    #[test]
    fn object_resolution_recurses() {
        let tree = json!({"greeting": "Hi {{$.name}}", "nested": ["{{$.amount}}", 3]});
        let resolved = resolve_object(&tree, &ctx());
        assert_eq!(resolved["greeting"], json!("Hi Ada"));
        assert_eq!(resolved["nested"][0], json!(1500));
        assert_eq!(resolved["nested"][1], json!(3));
    }

    #[test]
    fn round_trip_idempotent_without_nested_templates() {
        let tree = json!({"greeting": "Hi {{$.name}}"});
        let once = resolve_object(&tree, &ctx());
        let twice = resolve_object(&once, &ctx());
        assert_eq!(once, twice);
    }
}
