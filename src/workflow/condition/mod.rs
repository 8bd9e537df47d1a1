//! Condition evaluation.
//!
//! A condition node carries a predicate in one of two forms:
//!
//! - an expression, either as a bare string or `{"expression": "..."}`,
//!   see [`expr`] for the grammar
//! - structured rules `{"logical_operator": "and", "conditions": [...]}`
//!
//! Evaluation is pure. Anything that prevents a definite boolean answer is a
//! [`ConditionEvaluationError`]; there is no default branch.

pub mod expr;
pub mod models;
mod rules;

use serde_json::Value;

pub use expr::Expr;
pub use models::{ComparisonOperator, ConditionValue, LogicalOperator, Rule, RuleSet};

use crate::{ConditionEvaluationError, runtime::Context, workflow::node::ConditionConfig};

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Expression(Expr),
    Rules(RuleSet),
}

impl Predicate {
    pub fn parse(value: &Value) -> std::result::Result<Self, ConditionEvaluationError> {
        match value {
            Value::String(source) => Ok(Predicate::Expression(Expr::parse(source)?)),
            Value::Bool(b) => Ok(Predicate::Expression(Expr::Literal(Value::Bool(*b)))),
            Value::Object(map) => {
                if let Some(expression) = map.get("expression") {
                    let source = expression.as_str().ok_or_else(|| ConditionEvaluationError::Malformed("'expression' must be a string".to_string()))?;
                    return Ok(Predicate::Expression(Expr::parse(source)?));
                }
                if map.contains_key("conditions") {
                    let rules: RuleSet = serde_json::from_value(value.clone()).map_err(|e| ConditionEvaluationError::Malformed(e.to_string()))?;
                    return Ok(Predicate::Rules(rules));
                }
                Err(ConditionEvaluationError::Unsupported(value.to_string()))
            }
            other => Err(ConditionEvaluationError::Unsupported(other.to_string())),
        }
    }

    pub fn evaluate(
        &self,
        ctx: &Context,
    ) -> std::result::Result<bool, ConditionEvaluationError> {
        match self {
            Predicate::Expression(expr) => expr.evaluate(ctx),
            Predicate::Rules(rules) => rules.evaluate(ctx),
        }
    }
}

/// Decides the branch of a condition node. Implementations must be pure; the
/// engine runs them on the blocking pool under the per-call timeout.
pub trait ConditionEvaluator: Send + Sync {
    fn evaluate(
        &self,
        config: &ConditionConfig,
        ctx: &Context,
    ) -> std::result::Result<bool, ConditionEvaluationError>;
}

/// The built-in evaluator for expression and rule predicates.
#[derive(Debug, Default, Clone, Copy)]
pub struct PredicateEvaluator;

impl ConditionEvaluator for PredicateEvaluator {
    fn evaluate(
        &self,
        config: &ConditionConfig,
        ctx: &Context,
    ) -> std::result::Result<bool, ConditionEvaluationError> {
        evaluate(config, ctx)
    }
}

/// Decide which branch a condition node takes.
pub fn evaluate(
    config: &ConditionConfig,
    ctx: &Context,
) -> std::result::Result<bool, ConditionEvaluationError> {
    Predicate::parse(&config.predicate)?.evaluate(ctx)
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, sync::Arc};

    use serde_json::json;

    use super::*;

    fn ctx() -> Context {
        Context::new("r".to_string(), json!({}), Arc::new(HashMap::new())).with_parent_result(json!({"wasEmailSent": true, "score": 7}))
    }

    fn config(predicate: Value) -> ConditionConfig {
        ConditionConfig {
            predicate,
        }
    }

    #[test]
    fn test_expression_forms() {
        assert!(evaluate(&config(json!("wasEmailSent == true")), &ctx()).unwrap());
        assert!(!evaluate(&config(json!({"expression": "score > 10"})), &ctx()).unwrap());
        assert!(evaluate(&config(json!(true)), &ctx()).unwrap());
    }

    #[test]
    fn test_rules_form() {
        let predicate = json!({
            "logical_operator": "or",
            "conditions": [
                {"variable_selector": "score", "comparison_operator": "gt", "value": 10},
                {"variable_selector": "wasEmailSent", "comparison_operator": "is", "value": true}
            ]
        });
        assert!(evaluate(&config(predicate), &ctx()).unwrap());
    }

    #[test]
    fn test_unsupported_and_malformed() {
        assert!(matches!(evaluate(&config(json!(42)), &ctx()), Err(ConditionEvaluationError::Unsupported(_))));
        assert!(matches!(evaluate(&config(json!({"lua": "return true"})), &ctx()), Err(ConditionEvaluationError::Unsupported(_))));
        assert!(matches!(evaluate(&config(json!({"expression": 1})), &ctx()), Err(ConditionEvaluationError::Malformed(_))));
        assert!(matches!(
            evaluate(&config(json!({"conditions": [{"variable_selector": "score", "comparison_operator": "between"}]})), &ctx()),
            Err(ConditionEvaluationError::Malformed(_))
        ));
    }
}
