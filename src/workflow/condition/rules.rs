use serde_json::Value;

use crate::{
    ConditionEvaluationError,
    runtime::Context,
    workflow::{
        condition::models::{ComparisonOperator, ConditionValue, LogicalOperator, Rule, RuleSet},
        template,
    },
};

type EvalResult<T> = std::result::Result<T, ConditionEvaluationError>;

impl RuleSet {
    pub fn evaluate(
        &self,
        ctx: &Context,
    ) -> EvalResult<bool> {
        for rule in &self.conditions {
            let passed = rule.evaluate(ctx)?;
            match self.logical_operator {
                LogicalOperator::And if !passed => return Ok(false),
                LogicalOperator::Or if passed => return Ok(true),
                _ => {}
            }
        }

        Ok(self.logical_operator == LogicalOperator::And)
    }
}

impl Rule {
    pub fn evaluate(
        &self,
        ctx: &Context,
    ) -> EvalResult<bool> {
        let actual = self.select(ctx);
        let operator = self.comparison_operator;

        if operator.checks_presence() {
            return Ok(check_presence(actual.as_ref(), operator));
        }

        let actual = actual.ok_or_else(|| ConditionEvaluationError::MissingField(self.variable_selector.clone()))?;
        let expected = self
            .value
            .as_ref()
            .ok_or_else(|| ConditionEvaluationError::Malformed(format!("operator '{}' requires a value", operator.as_ref())))?;
        evaluate_with_value(&actual, operator, expected)
    }

    fn select(
        &self,
        ctx: &Context,
    ) -> Option<Value> {
        if self.variable_selector.contains("{{") {
            template::resolve_template_to_values(ctx, &self.variable_selector).ok().and_then(|v| v.into_iter().next())
        } else {
            ctx.lookup(&self.variable_selector)
        }
    }
}

fn check_presence(
    actual: Option<&Value>,
    operator: ComparisonOperator,
) -> bool {
    match operator {
        ComparisonOperator::Null => actual.is_none_or(Value::is_null),
        ComparisonOperator::NotNull => actual.is_some_and(|v| !v.is_null()),
        ComparisonOperator::Empty => is_empty(actual),
        _ => !is_empty(actual),
    }
}

fn is_empty(actual: Option<&Value>) -> bool {
    match actual {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Array(arr)) => arr.is_empty(),
        Some(Value::Object(obj)) => obj.is_empty(),
        _ => false,
    }
}

fn evaluate_with_value(
    actual: &Value,
    operator: ComparisonOperator,
    expected: &ConditionValue,
) -> EvalResult<bool> {
    let passed = match operator {
        ComparisonOperator::Contains => eval_contains(actual, expected),
        ComparisonOperator::NotContains => !eval_contains(actual, expected),
        ComparisonOperator::StartWith => matches!((actual, expected), (Value::String(s), ConditionValue::Str(e)) if s.starts_with(e.as_str())),
        ComparisonOperator::EndWith => matches!((actual, expected), (Value::String(s), ConditionValue::Str(e)) if s.ends_with(e.as_str())),
        ComparisonOperator::Is | ComparisonOperator::Eq => eval_is(actual, expected),
        ComparisonOperator::IsNot | ComparisonOperator::Ne => !eval_is(actual, expected),
        ComparisonOperator::In => eval_in(actual, expected),
        ComparisonOperator::NotIn => !eval_in(actual, expected),
        ComparisonOperator::AllOf => eval_all_of(actual, expected),
        ComparisonOperator::Gt => eval_cmp(actual, expected, |a, b| a > b)?,
        ComparisonOperator::Lt => eval_cmp(actual, expected, |a, b| a < b)?,
        ComparisonOperator::Ge => eval_cmp(actual, expected, |a, b| a >= b)?,
        ComparisonOperator::Le => eval_cmp(actual, expected, |a, b| a <= b)?,
        ComparisonOperator::Null | ComparisonOperator::NotNull | ComparisonOperator::Empty | ComparisonOperator::NotEmpty => check_presence(Some(actual), operator),
    };
    Ok(passed)
}

fn eval_contains(
    actual: &Value,
    expected: &ConditionValue,
) -> bool {
    match (actual, expected) {
        (Value::String(s), ConditionValue::Str(e)) => s.contains(e.as_str()),
        (Value::Array(arr), e) => arr.iter().any(|v| eval_is(v, e)),
        _ => false,
    }
}

/// Loose equality: numbers compare numerically, and a string expectation
/// matches the textual form of booleans and numbers.
fn eval_is(
    actual: &Value,
    expected: &ConditionValue,
) -> bool {
    match (actual, expected) {
        (Value::String(s), ConditionValue::Str(e)) => s == e,
        (Value::Bool(b), ConditionValue::Bool(e)) => b == e,
        (Value::Bool(b), ConditionValue::Str(e)) => b.to_string() == *e,
        (Value::Number(n), ConditionValue::Number(e)) => n.as_f64() == Some(*e),
        (Value::Number(n), ConditionValue::Str(e)) => e.parse::<f64>().is_ok_and(|e| n.as_f64() == Some(e)),
        (Value::String(s), ConditionValue::Number(e)) => s.parse::<f64>().is_ok_and(|s| s == *e),
        (a, ConditionValue::List(list)) => a.as_array() == Some(list),
        _ => false,
    }
}

fn eval_in(
    actual: &Value,
    expected: &ConditionValue,
) -> bool {
    match expected {
        ConditionValue::List(list) => list.iter().any(|item| loose_eq(actual, item)),
        ConditionValue::Str(s) => matches!(actual, Value::String(a) if s.contains(a.as_str())),
        _ => false,
    }
}

fn eval_all_of(
    actual: &Value,
    expected: &ConditionValue,
) -> bool {
    match (actual, expected) {
        (Value::Array(arr), ConditionValue::List(list)) => list.iter().all(|e| arr.iter().any(|v| loose_eq(v, e))),
        _ => false,
    }
}

fn eval_cmp<F>(
    actual: &Value,
    expected: &ConditionValue,
    cmp: F,
) -> EvalResult<bool>
where
    F: Fn(f64, f64) -> bool,
{
    let expected = match expected {
        ConditionValue::Number(n) => Some(*n),
        ConditionValue::Str(s) => s.parse::<f64>().ok(),
        _ => None,
    };

    match (actual.as_f64(), expected) {
        (Some(a), Some(e)) => Ok(cmp(a, e)),
        _ => Err(ConditionEvaluationError::TypeMismatch(format!("cannot order {} against {:?}", actual, expected))),
    }
}

fn loose_eq(
    a: &Value,
    b: &Value,
) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => s.parse::<f64>().ok() == n.as_f64(),
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, sync::Arc};

    use serde_json::json;

    use super::*;

    fn ctx() -> Context {
        Context::new("r".to_string(), json!({"tier": "gold"}), Arc::new(HashMap::new())).derive(
            "a",
            json!({"status": "sent", "count": 5, "tags": ["vip", "eu"], "ok": true, "note": ""}),
        )
    }

    fn rule(value: serde_json::Value) -> Rule {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_string_operators() {
        let ctx = ctx();
        assert!(rule(json!({"variable_selector": "parent.status", "comparison_operator": "is", "value": "sent"})).evaluate(&ctx).unwrap());
        assert!(rule(json!({"variable_selector": "status", "comparison_operator": "start_with", "value": "se"})).evaluate(&ctx).unwrap());
        assert!(rule(json!({"variable_selector": "status", "comparison_operator": "end_with", "value": "nt"})).evaluate(&ctx).unwrap());
        assert!(rule(json!({"variable_selector": "status", "comparison_operator": "not_contains", "value": "x"})).evaluate(&ctx).unwrap());
        assert!(rule(json!({"variable_selector": "{{#a.status#}}", "comparison_operator": "is_not", "value": "failed"})).evaluate(&ctx).unwrap());
    }

    #[test]
    fn test_array_operators() {
        let ctx = ctx();
        assert!(rule(json!({"variable_selector": "tags", "comparison_operator": "contains", "value": "vip"})).evaluate(&ctx).unwrap());
        assert!(rule(json!({"variable_selector": "tags", "comparison_operator": "all_of", "value": ["eu", "vip"]})).evaluate(&ctx).unwrap());
        assert!(rule(json!({"variable_selector": "initial.tier", "comparison_operator": "in", "value": ["gold", "silver"]})).evaluate(&ctx).unwrap());
        assert!(rule(json!({"variable_selector": "count", "comparison_operator": "not_in", "value": [1, 2]})).evaluate(&ctx).unwrap());
    }

    #[test]
    fn test_number_operators() {
        let ctx = ctx();
        assert!(rule(json!({"variable_selector": "count", "comparison_operator": "eq", "value": 5})).evaluate(&ctx).unwrap());
        assert!(rule(json!({"variable_selector": "count", "comparison_operator": "ge", "value": "5"})).evaluate(&ctx).unwrap());
        assert!(!rule(json!({"variable_selector": "count", "comparison_operator": "gt", "value": 10})).evaluate(&ctx).unwrap());

        let err = rule(json!({"variable_selector": "status", "comparison_operator": "lt", "value": 3})).evaluate(&ctx).unwrap_err();
        assert!(matches!(err, ConditionEvaluationError::TypeMismatch(_)));
    }

    #[test]
    fn test_presence_operators_tolerate_missing() {
        let ctx = ctx();
        assert!(rule(json!({"variable_selector": "missing", "comparison_operator": "null"})).evaluate(&ctx).unwrap());
        assert!(rule(json!({"variable_selector": "note", "comparison_operator": "empty"})).evaluate(&ctx).unwrap());
        assert!(rule(json!({"variable_selector": "ok", "comparison_operator": "not_null"})).evaluate(&ctx).unwrap());

        let err = rule(json!({"variable_selector": "missing", "comparison_operator": "is", "value": "x"})).evaluate(&ctx).unwrap_err();
        assert_eq!(err, ConditionEvaluationError::MissingField("missing".to_string()));
    }

    #[test]
    fn test_rule_set_logic() {
        let ctx = ctx();
        let all: RuleSet = serde_json::from_value(json!({
            "logical_operator": "and",
            "conditions": [
                {"variable_selector": "ok", "comparison_operator": "is", "value": true},
                {"variable_selector": "count", "comparison_operator": "lt", "value": 3}
            ]
        }))
        .unwrap();
        assert!(!all.evaluate(&ctx).unwrap());

        let any = RuleSet {
            logical_operator: LogicalOperator::Or,
            ..all
        };
        assert!(any.evaluate(&ctx).unwrap());
    }
}
