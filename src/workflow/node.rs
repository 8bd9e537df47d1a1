use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    ValidationError, ValidationReason,
    model::NodeModel,
};

/// node id
pub type NodeId = String;

/// The closed set of node kinds.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, strum::AsRefStr, strum::EnumString, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NodeKind {
    Trigger,
    Action,
    Condition,
}

/// Configuration of a trigger node: which external event arms it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TriggerConfig {
    #[serde(rename = "type", alias = "trigger_type", alias = "triggerType")]
    pub trigger_type: String,
    /// source-specific settings handed to the trigger source on arm
    #[serde(default)]
    pub config: Value,
    /// fields an activation payload must match for the trigger to fire
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,
}

/// Configuration of an action node: which action type to dispatch, with what parameters.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ActionConfig {
    #[serde(rename = "type", alias = "action_type", alias = "actionType")]
    pub action_type: String,
    #[serde(default)]
    pub config: Value,
}

/// Configuration of a condition node.
///
/// The predicate is kept raw: a malformed predicate is a failure of the node
/// when it runs, not a structural defect of the graph.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(transparent)]
pub struct ConditionConfig {
    pub predicate: Value,
}

/// Kind-specific node configuration, built from a [`NodeModel`]'s `kind` and `data`.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeConfig {
    Trigger(TriggerConfig),
    Action(ActionConfig),
    Condition(ConditionConfig),
}

impl NodeConfig {
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeConfig::Trigger(_) => NodeKind::Trigger,
            NodeConfig::Action(_) => NodeKind::Action,
            NodeConfig::Condition(_) => NodeKind::Condition,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// node id
    pub id: NodeId,
    /// display label
    pub label: String,
    /// display description
    pub desc: String,
    /// per-call timeout override
    pub timeout: Option<Duration>,
    /// kind and kind-specific configuration
    pub config: NodeConfig,
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        self.config.kind()
    }

    pub fn is_trigger(&self) -> bool {
        matches!(self.config, NodeConfig::Trigger(_))
    }

    pub fn is_condition(&self) -> bool {
        matches!(self.config, NodeConfig::Condition(_))
    }
}

impl TryFrom<&NodeModel> for Node {
    type Error = ValidationError;

    fn try_from(model: &NodeModel) -> std::result::Result<Self, Self::Error> {
        let kind: NodeKind = model.kind.parse().map_err(|_| ValidationError::at_node(ValidationReason::UnknownKind(model.kind.clone()), &model.id))?;

        let invalid = |e: serde_json::Error| ValidationError::at_node(ValidationReason::InvalidNodeData(e.to_string()), &model.id);
        let config = match kind {
            NodeKind::Trigger => NodeConfig::Trigger(serde_json::from_value(model.data.clone()).map_err(invalid)?),
            NodeKind::Action => NodeConfig::Action(serde_json::from_value(model.data.clone()).map_err(invalid)?),
            NodeKind::Condition => NodeConfig::Condition(ConditionConfig {
                predicate: model.data.clone(),
            }),
        };

        let data_str = |key: &str| model.data.get(key).and_then(Value::as_str).map(str::to_string);

        Ok(Self {
            id: model.id.clone(),
            label: model.label.clone().or_else(|| data_str("label")).unwrap_or_default(),
            desc: model.description.clone().or_else(|| data_str("description")).unwrap_or_default(),
            timeout: model.timeout.map(Duration::from_millis),
            config,
        })
    }
}
