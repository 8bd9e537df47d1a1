use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{
    AutoflowError, Result,
    model::{EdgeModel, NodeModel},
};

/// Workflow graph in its JSON exchange format.
///
/// This is untrusted input: turn it into a runnable
/// [`Workflow`](crate::Workflow) with [`validate`](crate::validate).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowModel {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub env: HashMap<String, String>,
    pub nodes: Vec<NodeModel>,
    pub edges: Vec<EdgeModel>,
}

impl WorkflowModel {
    pub fn from_json(s: &str) -> Result<Self> {
        serde_json::from_str::<WorkflowModel>(s).map_err(|e| AutoflowError::Convert(format!("invalid workflow json: {}", e)))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
