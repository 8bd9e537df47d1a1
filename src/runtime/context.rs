use std::{collections::HashMap, sync::Arc};

use serde_json::{Value, json};

use crate::{common::Vars, runtime::RunId};

/// Data visible to a single node execution.
///
/// A context is owned by one branch of a run. Deriving the context for a child
/// copies the ancestor outputs, so whatever a child (or the dispatcher it hands
/// the context to) does with its copy is never observable by a sibling.
#[derive(Debug, Clone, PartialEq)]
pub struct Context {
    run_id: RunId,
    initial: Arc<Value>,
    parent_result: Value,
    outputs: Vars,
    env: Arc<HashMap<String, String>>,
}

impl Context {
    pub fn new(
        run_id: RunId,
        initial: Value,
        env: Arc<HashMap<String, String>>,
    ) -> Self {
        Self {
            run_id,
            initial: Arc::new(initial),
            parent_result: Value::Null,
            outputs: Vars::new(),
            env,
        }
    }

    pub fn with_parent_result(
        mut self,
        value: Value,
    ) -> Self {
        self.parent_result = value;
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// The payload the run was started with.
    pub fn initial(&self) -> &Value {
        &self.initial
    }

    /// Value produced by the immediate parent node, `null` for a root.
    pub fn parent_result(&self) -> &Value {
        &self.parent_result
    }

    pub fn parent_result_mut(&mut self) -> &mut Value {
        &mut self.parent_result
    }

    /// Values produced by the ancestors on this branch, keyed by node id.
    pub fn outputs(&self) -> &Vars {
        &self.outputs
    }

    pub fn output(
        &self,
        nid: &str,
    ) -> Option<&Value> {
        self.outputs.get_value(nid)
    }

    pub fn env(
        &self,
        key: &str,
    ) -> Option<&str> {
        self.env.get(key).map(String::as_str)
    }

    pub fn env_vars(&self) -> &HashMap<String, String> {
        &self.env
    }

    /// Context for a child of `nid`, which produced `value`.
    pub(crate) fn derive(
        &self,
        nid: &str,
        value: Value,
    ) -> Context {
        let mut outputs = self.outputs.clone();
        outputs.set(nid, &value);

        Context {
            run_id: self.run_id.clone(),
            initial: self.initial.clone(),
            parent_result: value,
            outputs,
            env: self.env.clone(),
        }
    }

    /// Resolve a dotted path.
    ///
    /// Roots: `parent` (alias `parentResult`), `initial`, `nodes.<id>` and
    /// `env.<NAME>`. Any other path is looked up in the parent result first and
    /// then in the initial payload. Numeric segments index into arrays.
    pub fn lookup(
        &self,
        path: &str,
    ) -> Option<Value> {
        let mut segments = path.split('.');
        let head = segments.next()?;

        match head {
            "parent" | "parentResult" => walk(&self.parent_result, segments).cloned(),
            "initial" => walk(&self.initial, segments).cloned(),
            "nodes" => {
                let nid = segments.next()?;
                walk(self.outputs.get_value(nid)?, segments).cloned()
            }
            "env" => {
                let key = segments.next()?;
                if segments.next().is_some() {
                    return None;
                }
                self.env(key).map(|v| Value::String(v.to_string()))
            }
            _ => walk(&self.parent_result, path.split('.')).or_else(|| walk(&self.initial, path.split('.'))).cloned(),
        }
    }

    /// Snapshot of the whole context as JSON.
    pub fn to_value(&self) -> Value {
        json!({
            "run_id": self.run_id,
            "initial": *self.initial,
            "parent": self.parent_result,
            "nodes": self.outputs,
            "env": *self.env,
        })
    }
}

fn walk<'a, 'p>(
    value: &'a Value,
    segments: impl Iterator<Item = &'p str>,
) -> Option<&'a Value> {
    let mut current = value;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}
