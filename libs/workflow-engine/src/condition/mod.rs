//! Condition Evaluator (§2 item 2, §4.2): simple/compound/NOT condition
//! trees and transition selection with priority + default fallback.

use regex::Regex;
use serde_json::Value;
use strata_domain::condition::{CompoundOperator, ConditionExpression, SimpleOperator};
use strata_domain::step::TransitionRule;

use crate::expression::template::eval_expr;
use crate::expression::ExpressionContext;

/// Evaluate a condition tree against a context. Pure function of its
/// inputs (Testable Property 1): never mutates `ctx`, never errors.
#[must_use]
pub fn evaluate(condition: &ConditionExpression, ctx: &ExpressionContext) -> bool {
    match condition {
        ConditionExpression::Simple { left, operator, right } => {
            evaluate_simple(left, *operator, right.as_ref(), ctx)
        }
        ConditionExpression::Compound { operator, conditions } => match operator {
            CompoundOperator::And => conditions.iter().all(|c| evaluate(c, ctx)),
            CompoundOperator::Or => conditions.iter().any(|c| evaluate(c, ctx)),
        },
        ConditionExpression::Not { condition } => !evaluate(condition, ctx),
    }
}

fn resolve_left(left: &str, ctx: &ExpressionContext) -> Option<Value> {
    let trimmed = left.trim();
    let inner = trimmed
        .strip_prefix("{{")
        .and_then(|s| s.strip_suffix("}}"))
        .unwrap_or(trimmed);
    eval_expr(inner, ctx)
}

fn evaluate_simple(
    left: &str,
    operator: SimpleOperator,
    right: Option<&Value>,
    ctx: &ExpressionContext,
) -> bool {
    let resolved = resolve_left(left, ctx);

    match operator {
        SimpleOperator::Exists => resolved.is_some_and(|v| !v.is_null()),
        SimpleOperator::NotExists => !resolved.is_some_and(|v| !v.is_null()),
        _ => {
            let Some(left_val) = resolved else { return false };
            let Some(right_val) = right else { return false };
            match operator {
                SimpleOperator::Eq => values_equal(&left_val, right_val),
                SimpleOperator::Neq => !values_equal(&left_val, right_val),
                SimpleOperator::Gt => numeric_compare(&left_val, right_val, |a, b| a > b),
                SimpleOperator::Gte => numeric_compare(&left_val, right_val, |a, b| a >= b),
                SimpleOperator::Lt => numeric_compare(&left_val, right_val, |a, b| a < b),
                SimpleOperator::Lte => numeric_compare(&left_val, right_val, |a, b| a <= b),
                SimpleOperator::Contains => contains(&left_val, right_val),
                SimpleOperator::StartsWith => string_op(&left_val, right_val, str::starts_with),
                SimpleOperator::EndsWith => string_op(&left_val, right_val, str::ends_with),
                SimpleOperator::In => membership(right_val, &left_val),
                SimpleOperator::NotIn => right_val.as_array().map_or(true, |arr| {
                    !arr.iter().any(|v| values_equal(v, &left_val))
                }),
                SimpleOperator::Regex => regex_match(&left_val, right_val),
                SimpleOperator::Exists | SimpleOperator::NotExists => unreachable!(),
            }
        }
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    if let (Some(a), Some(b)) = (left.as_f64(), right.as_f64()) {
        return (a - b).abs() < f64::EPSILON;
    }
    left == right
}

fn numeric_compare(left: &Value, right: &Value, f: impl Fn(f64, f64) -> bool) -> bool {
    match (left.as_f64(), right.as_f64()) {
        (Some(a), Some(b)) => f(a, b),
        _ => false,
    }
}

fn contains(left: &Value, right: &Value) -> bool {
    match left {
        Value::Array(items) => items.iter().any(|v| values_equal(v, right)),
        Value::String(s) => right.as_str().is_some_and(|needle| s.contains(needle)),
        _ => false,
    }
}

fn string_op(left: &Value, right: &Value, f: impl Fn(&str, &str) -> bool) -> bool {
    match (left.as_str(), right.as_str()) {
        (Some(a), Some(b)) => f(a, b),
        _ => false,
    }
}

fn membership(right: &Value, left: &Value) -> bool {
    right
        .as_array()
        .is_some_and(|arr| arr.iter().any(|v| values_equal(v, left)))
}

fn regex_match(left: &Value, right: &Value) -> bool {
    let Some(pattern) = right.as_str() else { return false };
    let Ok(re) = Regex::new(pattern) else { return false };
    let haystack = left.as_str().map_or_else(|| left.to_string(), str::to_string);
    re.is_match(&haystack)
}

/// `findMatchingTransition` (§4.2): sort by ascending priority (missing =
/// +∞); first conditional match or unconditional non-default transition
/// wins; otherwise fall back to the `isDefault` transition.
#[must_use]
pub fn find_matching_transition<'a>(
    transitions: &'a [TransitionRule],
    ctx: &ExpressionContext,
) -> Option<&'a str> {
    let mut ordered: Vec<&TransitionRule> = transitions.iter().collect();
    ordered.sort_by_key(|t| t.priority.unwrap_or(i64::MAX));

    for transition in &ordered {
        let is_default = transition.is_default.unwrap_or(false);
        match &transition.condition {
            Some(condition) if evaluate(condition, ctx) => {
                return Some(transition.target_step_id.as_str());
            }
            None if !is_default => {
                return Some(transition.target_step_id.as_str());
            }
            _ => {}
        }
    }

    ordered
        .into_iter()
        .find(|t| t.is_default.unwrap_or(false))
        .map(|t| t.target_step_id.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn ctx(amount: i64) -> ExpressionContext {
        let mut vars = Map::new();
        vars.insert("amount".to_string(), json!(amount));
        ExpressionContext::new(vars, Map::new(), Value::Null)
    }

    fn gt(left: &str, right: Value) -> ConditionExpression {
        ConditionExpression::Simple {
            left: left.to_string(),
            operator: SimpleOperator::Gt,
            right: Some(right),
        }
    }

    #[test]
    fn simple_gt_condition() {
        assert!(evaluate(&gt("$.amount", json!(1000)), &ctx(1500)));
        assert!(!evaluate(&gt("$.amount", json!(1000)), &ctx(500)));
    }

    #[test]
    fn compound_and_short_circuits() {
        let cond = ConditionExpression::Compound {
            operator: CompoundOperator::And,
            conditions: vec![gt("$.amount", json!(0)), gt("$.amount", json!(10_000))],
        };
        assert!(!evaluate(&cond, &ctx(500)));
    }

    #[test]
    fn not_inverts() {
        let cond = ConditionExpression::Not {
            condition: Box::new(gt("$.amount", json!(1000))),
        };
        assert!(evaluate(&cond, &ctx(500)));
    }

    #[test]
    fn exists_and_not_exists() {
        let exists = ConditionExpression::Simple {
            left: "$.amount".to_string(),
            operator: SimpleOperator::Exists,
            right: None,
        };
        let not_exists = ConditionExpression::Simple {
            left: "$.missing".to_string(),
            operator: SimpleOperator::NotExists,
            right: None,
        };
        assert!(evaluate(&exists, &ctx(1)));
        assert!(evaluate(&not_exists, &ctx(1)));
    }

    #[test]
    fn regex_compile_failure_is_false() {
        let cond = ConditionExpression::Simple {
            left: "$.amount".to_string(),
            operator: SimpleOperator::Regex,
            right: Some(json!("[unterminated")),
        };
        assert!(!evaluate(&cond, &ctx(1)));
    }

    #[test]
    fn transition_selection_picks_first_matching_by_priority() {
        let transitions = vec![
            TransitionRule {
                target_step_id: "lowPath".to_string(),
                condition: None,
                is_default: Some(true),
                priority: None,
            },
            TransitionRule {
                target_step_id: "highPath".to_string(),
                condition: Some(gt("$.amount", json!(1000))),
                is_default: None,
                priority: Some(1),
            },
        ];
        let matched = find_matching_transition(&transitions, &ctx(1500));
        assert_eq!(matched, Some("highPath"));
        let matched_low = find_matching_transition(&transitions, &ctx(1));
        assert_eq!(matched_low, Some("lowPath"));
    }

    #[test]
    fn unconditional_non_default_matches_immediately() {
        let transitions = vec![TransitionRule {
            target_step_id: "next".to_string(),
            condition: None,
            is_default: None,
            priority: None,
        }];
        assert_eq!(find_matching_transition(&transitions, &ctx(0)), Some("next"));
    }

    #[test]
    fn no_match_and_no_default_returns_none() {
        let transitions = vec![TransitionRule {
            target_step_id: "next".to_string(),
            condition: Some(gt("$.amount", json!(999_999))),
            is_default: None,
            priority: None,
        }];
        assert_eq!(find_matching_transition(&transitions, &ctx(1)), None);
    }
}
