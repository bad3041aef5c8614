//! `fn.name(args)` builtins (§4.1 required set).
//!
//! Malformed calls (unknown name, wrong arity, non-coercible argument) yield
//! `None` ("unresolved") rather than an error, matching the evaluator's
//! general failure policy.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde_json::Value;

/// Evaluate one builtin call given its already-split, already-resolved
/// argument values (`None` per-argument means that argument was itself
/// unresolved).
#[must_use]
pub fn call(name: &str, args: &[Option<Value>]) -> Option<Value> {
    match name {
        "now" => Some(Value::String(Utc::now().to_rfc3339())),
        "today" => Some(Value::String(Utc::now().format("%Y-%m-%d").to_string())),
        "dateAdd" => date_add(args),
        "dateDiff" => date_diff(args),
        "formatDate" => format_date(args),
        "uuid" => Some(Value::String(uuid::Uuid::new_v4().to_string())),
        "randomInt" => random_int(args),
        "upper" => as_str(args, 0).map(|s| Value::String(s.to_uppercase())),
        "lower" => as_str(args, 0).map(|s| Value::String(s.to_lowercase())),
        "trim" => as_str(args, 0).map(|s| Value::String(s.trim().to_string())),
        "split" => split(args),
        "join" => join(args),
        "concat" => concat(args),
        "substring" => substring(args),
        "replace" => replace(args),
        "startsWith" => bool_pair(args, str::starts_with),
        "endsWith" => bool_pair(args, str::ends_with),
        "contains" => bool_pair(args, str::contains),
        "length" => length(args),
        "sum" => aggregate(args, 0.0, |acc, n| acc + n),
        "avg" => average(args),
        "min" => aggregate(args, f64::INFINITY, f64::min),
        "max" => aggregate(args, f64::NEG_INFINITY, f64::max),
        "count" => count(args),
        "round" => as_f64(args, 0).map(|n| json_number(n.round())),
        "abs" => as_f64(args, 0).map(|n| json_number(n.abs())),
        "default" | "coalesce" => default_or_coalesce(args),
        "ifThen" => if_then(args),
        "isNull" => Some(Value::Bool(is_nullish(args.first()))),
        "isNotNull" => Some(Value::Bool(!is_nullish(args.first()))),
        "isEmpty" => Some(Value::Bool(is_empty(args.first()))),
        "stringify" => args.first().and_then(Option::clone).map(|v| {
            Value::String(serde_json::to_string(&v).unwrap_or_default())
        }),
        "parse" => as_str(args, 0).and_then(|s| serde_json::from_str(&s).ok()),
        "toNumber" => to_number(args),
        "toString" => to_string_builtin(args),
        "toBoolean" => to_boolean(args),
        _ => None,
    }
}

fn as_str(args: &[Option<Value>], idx: usize) -> Option<String> {
    match args.get(idx)?.as_ref()? {
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn as_f64(args: &[Option<Value>], idx: usize) -> Option<f64> {
    args.get(idx)?.as_ref()?.as_f64()
}

fn json_number(n: f64) -> Value {
    serde_json::Number::from_f64(n).map_or(Value::Null, Value::Number)
}

fn date_add(args: &[Option<Value>]) -> Option<Value> {
    let n = as_f64(args, 0)? as i64;
    let unit = as_str(args, 1)?;
    let delta = match unit.as_str() {
        "days" => Duration::days(n),
        "hours" => Duration::hours(n),
        "minutes" => Duration::minutes(n),
        _ => return None,
    };
    Some(Value::String((Utc::now() + delta).to_rfc3339()))
}

fn date_diff(args: &[Option<Value>]) -> Option<Value> {
    let a: DateTime<Utc> = as_str(args, 0)?.parse().ok()?;
    let b: DateTime<Utc> = as_str(args, 1)?.parse().ok()?;
    let unit = as_str(args, 2)?;
    let diff = a - b;
    let value = match unit.as_str() {
        "days" => diff.num_days(),
        "hours" => diff.num_hours(),
        "minutes" => diff.num_minutes(),
        _ => return None,
    };
    Some(Value::from(value))
}

fn format_date(args: &[Option<Value>]) -> Option<Value> {
    let d: DateTime<Utc> = as_str(args, 0)?.parse().ok()?;
    let pattern = as_str(args, 1)?;
    Some(Value::String(d.format(&pattern).to_string()))
}

fn random_int(args: &[Option<Value>]) -> Option<Value> {
    let min = as_f64(args, 0)? as i64;
    let max = as_f64(args, 1)? as i64;
    if min > max {
        return None;
    }
    Some(Value::from(rand::thread_rng().gen_range(min..=max)))
}

fn split(args: &[Option<Value>]) -> Option<Value> {
    let s = as_str(args, 0)?;
    let sep = as_str(args, 1)?;
    Some(Value::Array(
        s.split(sep.as_str()).map(|p| Value::String(p.to_string())).collect(),
    ))
}

fn join(args: &[Option<Value>]) -> Option<Value> {
    let arr = args.first()?.as_ref()?.as_array()?;
    let sep = as_str(args, 1)?;
    let parts: Vec<String> = arr
        .iter()
        .map(|v| v.as_str().map_or_else(|| v.to_string(), str::to_string))
        .collect();
    Some(Value::String(parts.join(&sep)))
}

fn concat(args: &[Option<Value>]) -> Option<Value> {
    let mut out = String::new();
    for arg in args {
        let v = arg.as_ref()?;
        out.push_str(&v.as_str().map_or_else(|| v.to_string(), str::to_string));
    }
    Some(Value::String(out))
}

fn substring(args: &[Option<Value>]) -> Option<Value> {
    let s = as_str(args, 0)?;
    let start = as_f64(args, 1)? as usize;
    let chars: Vec<char> = s.chars().collect();
    let end = args
        .get(2)
        .and_then(|v| v.as_ref())
        .and_then(serde_json::Value::as_f64)
        .map_or(chars.len(), |e| e as usize);
    if start > chars.len() {
        return Some(Value::String(String::new()));
    }
    let end = end.min(chars.len()).max(start);
    Some(Value::String(chars[start..end].iter().collect()))
}

fn replace(args: &[Option<Value>]) -> Option<Value> {
    let s = as_str(args, 0)?;
    let from = as_str(args, 1)?;
    let to = as_str(args, 2)?;
    Some(Value::String(s.replace(from.as_str(), &to)))
}

fn bool_pair(args: &[Option<Value>], f: impl Fn(&str, &str) -> bool) -> Option<Value> {
    let a = as_str(args, 0)?;
    let b = as_str(args, 1)?;
    Some(Value::Bool(f(&a, &b)))
}

fn length(args: &[Option<Value>]) -> Option<Value> {
    match args.first()?.as_ref()? {
        Value::String(s) => Some(Value::from(s.chars().count())),
        Value::Array(a) => Some(Value::from(a.len())),
        Value::Object(o) => Some(Value::from(o.len())),
        _ => None,
    }
}

fn numbers(args: &[Option<Value>]) -> Option<Vec<f64>> {
    let source: Vec<Value> = if let Some(Value::Array(a)) = args.first()?.as_ref() {
        a.clone()
    } else {
        args.iter().filter_map(|a| a.clone()).collect()
    };
    source.into_iter().map(|v| v.as_f64()).collect()
}

fn aggregate(args: &[Option<Value>], init: f64, f: impl Fn(f64, f64) -> f64) -> Option<Value> {
    let nums = numbers(args)?;
    if nums.is_empty() {
        return Some(json_number(if init.is_infinite() { 0.0 } else { init }));
    }
    Some(json_number(nums.into_iter().fold(init, f)))
}

fn average(args: &[Option<Value>]) -> Option<Value> {
    let nums = numbers(args)?;
    if nums.is_empty() {
        return Some(json_number(0.0));
    }
    #[allow(clippy::cast_precision_loss)]
    let avg = nums.iter().sum::<f64>() / nums.len() as f64;
    Some(json_number(avg))
}

fn count(args: &[Option<Value>]) -> Option<Value> {
    match args.first()?.as_ref()? {
        Value::Array(a) => Some(Value::from(a.len())),
        _ => Some(Value::from(1)),
    }
}

fn default_or_coalesce(args: &[Option<Value>]) -> Option<Value> {
    for arg in args {
        if let Some(v) = arg {
            if !v.is_null() {
                return Some(v.clone());
            }
        }
    }
    args.last().and_then(Option::clone)
}

fn if_then(args: &[Option<Value>]) -> Option<Value> {
    let cond = args.first()?.as_ref()?;
    let truthy = match cond {
        Value::Bool(b) => *b,
        Value::Null => false,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    };
    if truthy {
        args.get(1).and_then(Option::clone)
    } else {
        args.get(2).and_then(Option::clone)
    }
}

fn is_nullish(arg: Option<&Option<Value>>) -> bool {
    match arg {
        None | Some(None) => true,
        Some(Some(v)) => v.is_null(),
    }
}

fn is_empty(arg: Option<&Option<Value>>) -> bool {
    match arg {
        None | Some(None) => true,
        Some(Some(Value::Null)) => true,
        Some(Some(Value::String(s))) => s.is_empty(),
        Some(Some(Value::Array(a))) => a.is_empty(),
        Some(Some(Value::Object(o))) => o.is_empty(),
        Some(Some(_)) => false,
    }
}

fn to_number(args: &[Option<Value>]) -> Option<Value> {
    match args.first()?.as_ref()? {
        Value::Number(n) => Some(Value::Number(n.clone())),
        Value::String(s) => s.trim().parse::<f64>().ok().map(json_number),
        Value::Bool(b) => Some(Value::from(i32::from(*b))),
        _ => None,
    }
}

fn to_string_builtin(args: &[Option<Value>]) -> Option<Value> {
    match args.first()?.as_ref()? {
        Value::String(s) => Some(Value::String(s.clone())),
        other => Some(Value::String(other.to_string())),
    }
}

fn to_boolean(args: &[Option<Value>]) -> Option<Value> {
    match args.first()?.as_ref()? {
        Value::Bool(b) => Some(Value::Bool(*b)),
        Value::String(s) => Some(Value::Bool(s.eq_ignore_ascii_case("true"))),
        Value::Number(n) => Some(Value::Bool(n.as_f64().is_some_and(|f| f != 0.0))),
        Value::Null => Some(Value::Bool(false)),
        _ => Some(Value::Bool(true)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upper_and_lower() {
        assert_eq!(
            call("upper", &[Some(Value::String("ada".into()))]),
            Some(Value::String("ADA".into()))
        );
        assert_eq!(
            call("lower", &[Some(Value::String("ADA".into()))]),
            Some(Value::String("ada".into()))
        );
    }

    #[test]
    fn sum_over_array() {
        let arr = Value::Array(vec![Value::from(1), Value::from(2), Value::from(3)]);
        assert_eq!(call("sum", &[Some(arr)]), Some(json_number(6.0)));
    }

    #[test]
    fn default_skips_null() {
        let result = call("default", &[Some(Value::Null), Some(Value::from(5))]);
        assert_eq!(result, Some(Value::from(5)));
    }

    #[test]
    fn is_empty_treats_unresolved_as_empty() {
        assert_eq!(call("isEmpty", &[None]), Some(Value::Bool(true)));
    }

    #[test]
    fn unknown_builtin_is_unresolved() {
        assert_eq!(call("notARealFn", &[]), None);
    }
}
