//! `ConditionExpression` tagged union (§3) and the operators it carries.
//!
//! This module only defines the data shape; evaluation lives in the engine
//! crate's condition evaluator, which is the only place that needs to know
//! how to walk one of these trees.

use serde::{Deserialize, Serialize};

/// Comparator used by a [`ConditionExpression::Simple`] leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SimpleOperator {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
    StartsWith,
    EndsWith,
    In,
    NotIn,
    Exists,
    NotExists,
    Regex,
}

/// Combinator used by a [`ConditionExpression::Compound`] node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CompoundOperator {
    And,
    Or,
}

/// A simple/compound/not condition tree (§3 `ConditionExpression`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ConditionExpression {
    Simple {
        left: String,
        operator: SimpleOperator,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        right: Option<serde_json::Value>,
    },
    Compound {
        operator: CompoundOperator,
        conditions: Vec<ConditionExpression>,
    },
    Not {
        condition: Box<ConditionExpression>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_condition_roundtrips() {
        let cond = ConditionExpression::Simple {
            left: "$.amount".to_string(),
            operator: SimpleOperator::Gt,
            right: Some(serde_json::json!(1000)),
        };
        let json = serde_json::to_string(&cond).unwrap();
        let back: ConditionExpression = serde_json::from_str(&json).unwrap();
        match back {
            ConditionExpression::Simple { left, operator, .. } => {
                assert_eq!(left, "$.amount");
                assert_eq!(operator, SimpleOperator::Gt);
            }
            _ => panic!("expected Simple"),
        }
    }

    #[test]
    fn compound_and_not_roundtrip() {
        let cond = ConditionExpression::Not {
            condition: Box::new(ConditionExpression::Compound {
                operator: CompoundOperator::And,
                conditions: vec![ConditionExpression::Simple {
                    left: "$.x".to_string(),
                    operator: SimpleOperator::Exists,
                    right: None,
                }],
            }),
        };
        let json = serde_json::to_string(&cond).unwrap();
        assert!(serde_json::from_str::<ConditionExpression>(&json).is_ok());
    }
}
