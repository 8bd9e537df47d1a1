//! A JSON object map used for node outputs.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

/// Ordered string-keyed map of JSON values.
///
/// Cloning a `Vars` produces an independent copy, which is what the
/// per-branch context relies on: extending one branch's outputs never leaks
/// into a sibling.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Vars {
    inner: Map<String, Value>,
}

impl Vars {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with<V: Serialize>(
        mut self,
        key: &str,
        value: V,
    ) -> Self {
        self.set(key, value);
        self
    }

    /// Insert a value, replacing any previous value under `key`.
    /// Values that fail to serialize are stored as `null`.
    pub fn set<V: Serialize>(
        &mut self,
        key: &str,
        value: V,
    ) {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.inner.insert(key.to_string(), value);
    }

    /// Get a value deserialized into `T`.
    pub fn get<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Option<T> {
        self.inner.get(key).and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Borrow the raw JSON value under `key`.
    pub fn get_value(
        &self,
        key: &str,
    ) -> Option<&Value> {
        self.inner.get(key)
    }

    pub fn contains(
        &self,
        key: &str,
    ) -> bool {
        self.inner.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.inner.iter()
    }
}

impl From<Value> for Vars {
    /// Objects become the map; any other value is stored under `"value"`.
    fn from(value: Value) -> Self {
        match value {
            Value::Object(inner) => Self {
                inner,
            },
            Value::Null => Self::new(),
            other => Self::new().with("value", other),
        }
    }
}

impl From<Vars> for Value {
    fn from(vars: Vars) -> Self {
        Value::Object(vars.inner)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_set_and_get() {
        let vars = Vars::new().with("a", 1).with("b", "two").with("c", json!({"d": true}));

        assert_eq!(vars.get::<i64>("a"), Some(1));
        assert_eq!(vars.get::<String>("b"), Some("two".to_string()));
        assert_eq!(vars.get_value("c"), Some(&json!({"d": true})));
        assert_eq!(vars.get::<i64>("b"), None);
        assert_eq!(vars.len(), 3);
    }

    #[test]
    fn test_clone_is_independent() {
        let base = Vars::new().with("a", 1);
        let mut branch = base.clone();
        branch.set("b", 2);

        assert!(!base.contains("b"));
        assert!(branch.contains("a"));
    }

    #[test]
    fn test_from_non_object_value() {
        let vars = Vars::from(json!(42));
        assert_eq!(vars.get::<i64>("value"), Some(42));
        assert!(Vars::from(Value::Null).is_empty());
    }
}
