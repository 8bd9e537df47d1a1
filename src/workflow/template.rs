use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::{AutoflowError, Result, runtime::Context};

/// Output placeholder: `{{#nodeId.key#}}` or `{{#nodeId.key.subkey#}}`.
/// `nodeId` may also be one of the context roots `parent` or `initial`.
static OUTPUT_TEMPLATE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{\{#([^.#]+)\.([^#]+)#\}\}").expect("output template pattern"));

/// Environment placeholder: `{{$VAR_NAME$}}`.
static ENV_TEMPLATE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{\{\$([^$]+)\$\}\}").expect("env template pattern"));

/// Resolve every placeholder in `template` to its string form.
/// Fails listing all placeholders that could not be resolved.
pub fn resolve_template(
    ctx: &Context,
    template: &str,
) -> Result<String> {
    let mut result = template.to_string();
    let mut errors: Vec<String> = Vec::new();

    for caps in ENV_TEMPLATE.captures_iter(template) {
        let full_match = &caps[0];
        let var_name = &caps[1];

        match ctx.env(var_name) {
            Some(value) => result = result.replace(full_match, value),
            None => errors.push(format!("env variable '{}' not found", var_name)),
        }
    }

    for caps in OUTPUT_TEMPLATE.captures_iter(template) {
        let full_match = &caps[0];

        match lookup_output(ctx, &caps[1], &caps[2]) {
            Some(Value::String(s)) => result = result.replace(full_match, &s),
            Some(v) => result = result.replace(full_match, &v.to_string()),
            None => errors.push(format!("variable '{}' not found", full_match)),
        }
    }

    if !errors.is_empty() {
        return Err(AutoflowError::Runtime(errors.join(", ")));
    }

    Ok(result)
}

/// Resolve output placeholders and return the matched values in order.
/// A template without placeholders yields itself as a single string value.
pub fn resolve_template_to_values(
    ctx: &Context,
    template: &str,
) -> Result<Vec<Value>> {
    let mut values: Vec<Value> = Vec::new();
    let mut errors: Vec<String> = Vec::new();

    for caps in OUTPUT_TEMPLATE.captures_iter(template) {
        match lookup_output(ctx, &caps[1], &caps[2]) {
            Some(value) => values.push(value),
            None => errors.push(format!("variable '{}' not found", &caps[0])),
        }
    }

    if !errors.is_empty() {
        return Err(AutoflowError::Runtime(errors.join(", ")));
    }

    if values.is_empty() {
        return Ok(vec![Value::String(template.to_string())]);
    }

    Ok(values)
}

/// Resolve placeholders in a JSON value recursively.
///
/// A string that consists of exactly one output placeholder is replaced by the
/// referenced value itself, keeping its JSON type.
pub fn resolve_json_value(
    ctx: &Context,
    value: &Value,
) -> Result<Value> {
    match value {
        Value::String(s) => {
            if let Some(caps) = OUTPUT_TEMPLATE.captures(s)
                && caps[0].len() == s.len()
            {
                return lookup_output(ctx, &caps[1], &caps[2]).ok_or_else(|| AutoflowError::Runtime(format!("variable '{}' not found", s)));
            }
            Ok(Value::String(resolve_template(ctx, s)?))
        }
        Value::Array(arr) => {
            let resolved: Result<Vec<Value>> = arr.iter().map(|v| resolve_json_value(ctx, v)).collect();
            Ok(Value::Array(resolved?))
        }
        Value::Object(obj) => {
            let resolved: Result<serde_json::Map<String, Value>> = obj.iter().map(|(k, v)| resolve_json_value(ctx, v).map(|rv| (k.clone(), rv))).collect();
            Ok(Value::Object(resolved?))
        }
        _ => Ok(value.clone()),
    }
}

fn lookup_output(
    ctx: &Context,
    nid: &str,
    key_path: &str,
) -> Option<Value> {
    match ctx.output(nid) {
        Some(_) => ctx.lookup(&format!("nodes.{nid}.{key_path}")),
        None if matches!(nid, "parent" | "parentResult" | "initial") => ctx.lookup(&format!("{nid}.{key_path}")),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, sync::Arc};

    use serde_json::json;

    use super::*;

    fn create_test_context() -> Context {
        let env = Arc::new(HashMap::from([
            ("HOST".to_string(), "localhost".to_string()),
            ("PORT".to_string(), "8080".to_string()),
        ]));
        Context::new("test-run".to_string(), json!({"from": "ops@example.com"}), env)
            .derive("node1", json!({"name": "Alice", "age": 30, "data": {"user": {"name": "Bob"}}}))
            .derive("node2", json!({"count": 42, "active": true}))
    }

    #[test]
    fn test_resolve_template_no_variables() {
        let ctx = create_test_context();
        assert_eq!(resolve_template(&ctx, "hello world").unwrap(), "hello world");
    }

    #[test]
    fn test_resolve_template_outputs() {
        let ctx = create_test_context();
        assert_eq!(resolve_template(&ctx, "{{#node1.name#}}").unwrap(), "Alice");
        assert_eq!(resolve_template(&ctx, "{{#node1.data.user.name#}}").unwrap(), "Bob");
        assert_eq!(resolve_template(&ctx, "count: {{#node2.count#}}, active: {{#node2.active#}}").unwrap(), "count: 42, active: true");
        assert_eq!(resolve_template(&ctx, "{{#node1.name#}} is {{#node1.age#}} years old").unwrap(), "Alice is 30 years old");
    }

    #[test]
    fn test_resolve_template_context_roots() {
        let ctx = create_test_context();
        assert_eq!(resolve_template(&ctx, "to {{#initial.from#}}").unwrap(), "to ops@example.com");
        assert_eq!(resolve_template(&ctx, "{{#parent.count#}}").unwrap(), "42");
    }

    #[test]
    fn test_resolve_template_missing() {
        let ctx = create_test_context();
        let err = resolve_template(&ctx, "{{#unknown.value#}}").unwrap_err();
        assert!(err.to_string().contains("not found"));
        assert!(resolve_template(&ctx, "{{#node1.unknown#}}").is_err());
    }

    #[test]
    fn test_resolve_template_env() {
        let ctx = create_test_context();
        assert_eq!(resolve_template(&ctx, "http://{{$HOST$}}:{{$PORT$}}/api").unwrap(), "http://localhost:8080/api");
        assert_eq!(resolve_template(&ctx, "{{$HOST$}}, {{#node1.name#}}!").unwrap(), "localhost, Alice!");

        let err = resolve_template(&ctx, "{{$NONEXISTENT_VAR$}}").unwrap_err();
        assert!(err.to_string().contains("env variable"));
    }

    #[test]
    fn test_resolve_to_values() {
        let ctx = create_test_context();
        assert_eq!(resolve_template_to_values(&ctx, "plain text").unwrap(), vec![json!("plain text")]);
        assert_eq!(resolve_template_to_values(&ctx, "{{#node1.data#}}").unwrap(), vec![json!({"user": {"name": "Bob"}})]);
        assert_eq!(resolve_template_to_values(&ctx, "{{#node1.age#}} and {{#node2.count#}}").unwrap(), vec![json!(30), json!(42)]);
    }

    #[test]
    fn test_resolve_json_value_keeps_types() {
        let ctx = create_test_context();
        let input = json!({
            "user": "{{#node1.name#}}",
            "years": "{{#node1.age#}}",
            "label": "age {{#node1.age#}}",
            "nested": {"list": ["{{#node2.active#}}", 1, null]}
        });
        let result = resolve_json_value(&ctx, &input).unwrap();
        assert_eq!(result, json!({"user": "Alice", "years": 30, "label": "age 30", "nested": {"list": [true, 1, null]}}));
    }

    #[test]
    fn test_resolve_json_value_missing_fails() {
        let ctx = create_test_context();
        assert!(resolve_json_value(&ctx, &json!({"to": "{{#node9.email#}}"})).is_err());
        assert_eq!(resolve_json_value(&ctx, &json!(42)).unwrap(), json!(42));
    }
}
