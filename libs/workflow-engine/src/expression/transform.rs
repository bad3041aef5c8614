//! The advanced transform expression language for `transform` steps (§4.1,
//! §8): a small JSON-query dialect layered on top of [`super::template`]'s
//! path resolution, adding array filtering (`items[predicate]`) and
//! aggregation (`sum`/`avg`) over the filtered set, plus dotted-path
//! projection.
//!
//! This is deliberately a thin, purpose-built evaluator rather than a full
//! expression-language reimplementation: the contract (§4.1) is that the
//! examples in §8 produce the expected results, not that every conceivable
//! query form is supported.

use serde_json::Value;

use super::context::ExpressionContext;
use super::path::resolve_path;
use super::template::eval_expr;

/// Evaluate a transform expression against the context's variables and
/// return the resulting value (never an error; unresolvable sub-expressions
/// behave like the rest of §4.1 and yield `null`).
#[must_use]
pub fn evaluate(expression: &str, ctx: &ExpressionContext) -> Value {
    let expression = expression.trim();

    if let Some(rest) = expression.strip_prefix("sum(").and_then(|s| s.strip_suffix(')')) {
        return aggregate(rest, ctx, |nums| nums.iter().sum());
    }
    if let Some(rest) = expression.strip_prefix("avg(").and_then(|s| s.strip_suffix(')')) {
        return aggregate(rest, ctx, |nums| {
            if nums.is_empty() {
                0.0
            } else {
                #[allow(clippy::cast_precision_loss)]
                let len = nums.len() as f64;
                nums.iter().sum::<f64>() / len
            }
        });
    }

    if let Some((base, predicate, field)) = split_filter(expression) {
        let items = resolve_source(base, ctx);
        let filtered = filter_items(&items, predicate, ctx);
        return match field {
            Some(field) => Value::Array(
                filtered.iter().map(|item| resolve_path(field, item).cloned().unwrap_or(Value::Null)).collect(),
            ),
            None => Value::Array(filtered),
        };
    }

    // Fall back to the general template/path resolver so plain `$.path`
    // projections and `{{ }}`-free dotted paths both work as transforms.
    if let Some(rest) = expression.strip_prefix("$.") {
        let root = Value::Object(ctx.variables.clone());
        return resolve_path(rest, &root).cloned().unwrap_or(Value::Null);
    }
    eval_expr(expression, ctx).unwrap_or(Value::Null)
}

/// `items[predicate]` or `items[predicate].field` — array filtering with an
/// optional dotted-path projection over each filtered item. Returns
/// `Some((source, predicate, field))` when `expression` has that shape.
fn split_filter(expression: &str) -> Option<(&str, &str, Option<&str>)> {
    let open = expression.find('[')?;
    let close = expression.find(']')?;
    if close < open {
        return None;
    }
    let base = &expression[..open];
    let predicate = &expression[open + 1..close];
    let rest = &expression[close + 1..];
    if rest.is_empty() {
        Some((base, predicate, None))
    } else {
        let field = rest.strip_prefix('.')?;
        if field.is_empty() {
            None
        } else {
            Some((base, predicate, Some(field)))
        }
    }
}

fn resolve_source(path: &str, ctx: &ExpressionContext) -> Vec<Value> {
    let resolved = if let Some(rest) = path.strip_prefix("$.") {
        let root = Value::Object(ctx.variables.clone());
        resolve_path(rest, &root).cloned()
    } else {
        eval_expr(path, ctx)
    };
    match resolved {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    }
}

fn filter_items(items: &[Value], predicate: &str, ctx: &ExpressionContext) -> Vec<Value> {
    items
        .iter()
        .filter(|item| evaluate_item_predicate(item, predicate, ctx))
        .cloned()
        .collect()
}

/// Predicates are a single simple comparison `field op literal` evaluated
/// per item, mirroring the event-filter grammar's intentional simplicity (§4.5).
fn evaluate_item_predicate(item: &Value, predicate: &str, ctx: &ExpressionContext) -> bool {
    let predicate = predicate.trim();
    for op in ["==", "!=", ">=", "<=", ">", "<"] {
        if let Some((field, literal)) = predicate.split_once(op) {
            let field = field.trim();
            let literal = literal.trim();
            let left = resolve_path(field, item).cloned().unwrap_or(Value::Null);
            let right = eval_expr(literal, ctx).unwrap_or_else(|| literal_value(literal));
            return compare(op, &left, &right);
        }
    }
    false
}

fn literal_value(s: &str) -> Value {
    let s = s.trim().trim_matches('\'').trim_matches('"');
    s.parse::<f64>()
        .map_or_else(|_| Value::String(s.to_string()), |n| {
            serde_json::Number::from_f64(n).map_or(Value::Null, Value::Number)
        })
}

fn compare(op: &str, left: &Value, right: &Value) -> bool {
    if let (Some(l), Some(r)) = (left.as_f64(), right.as_f64()) {
        return match op {
            "==" => (l - r).abs() < f64::EPSILON,
            "!=" => (l - r).abs() >= f64::EPSILON,
            ">" => l > r,
            ">=" => l >= r,
            "<" => l < r,
            "<=" => l <= r,
            _ => false,
        };
    }
    match op {
        "==" => left == right,
        "!=" => left != right,
        _ => false,
    }
}

fn aggregate(inner: &str, ctx: &ExpressionContext, f: impl Fn(&[f64]) -> f64) -> Value {
    let (items, field) = if let Some((base, predicate, field)) = split_filter(inner) {
        (filter_items(&resolve_source(base, ctx), predicate, ctx), field)
    } else {
        (resolve_source(inner, ctx), None)
    };
    let nums: Vec<f64> = items
        .iter()
        .filter_map(|item| match field {
            Some(field) => resolve_path(field, item).and_then(serde_json::Value::as_f64),
            None => item.as_f64(),
        })
        .collect();
    serde_json::Number::from_f64(f(&nums)).map_or(Value::Null, Value::Number)
}
