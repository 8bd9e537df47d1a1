//! Error types for Autoflow.
//!
//! The crate-wide error is [`AutoflowError`]. The workflow-specific taxonomy is
//! split into one type per failure domain:
//!
//! - [`ValidationError`]: structural defect in a workflow graph, raised before
//!   anything runs
//! - [`ConditionEvaluationError`]: a condition predicate could not be evaluated
//! - [`DispatchError`]: an action call failed, timed out or reported a failure
//! - [`ExecutionError`]: run-level summary of the nodes that failed

use std::{fmt, io::ErrorKind};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    runtime::RunId,
    workflow::{
        edge::{Branch, EdgeId},
        node::NodeId,
    },
};

/// Unified error type for all Autoflow operations.
#[derive(Deserialize, Serialize, Error, Debug, Clone, PartialEq)]
pub enum AutoflowError {
    /// Engine-level errors (startup, shutdown, unknown runs).
    #[error("{0}")]
    Engine(String),

    /// Configuration parsing or validation errors.
    #[error("{0}")]
    Config(String),

    /// Data conversion errors (JSON, TOML).
    #[error("{0}")]
    Convert(String),

    /// Runtime execution errors.
    #[error("{0}")]
    Runtime(String),

    /// Trigger arming errors.
    #[error("{0}")]
    Trigger(String),

    /// Message queue errors.
    #[error("{0}")]
    Queue(String),

    /// I/O operation errors.
    #[error("{0}")]
    IoError(String),

    /// The workflow graph is malformed.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A condition predicate could not be evaluated.
    #[error(transparent)]
    Condition(#[from] ConditionEvaluationError),

    /// An action dispatch failed.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// One or more nodes of a run failed.
    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

/// Structural defect found while validating a workflow graph.
#[derive(Deserialize, Serialize, Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason}{}", location(.node_id, .edge_id))]
pub struct ValidationError {
    pub reason: ValidationReason,
    pub node_id: Option<NodeId>,
    pub edge_id: Option<EdgeId>,
}

fn location(
    node_id: &Option<NodeId>,
    edge_id: &Option<EdgeId>,
) -> String {
    match (node_id, edge_id) {
        (Some(n), Some(e)) => format!(" (node: {n}, edge: {e})"),
        (Some(n), None) => format!(" (node: {n})"),
        (None, Some(e)) => format!(" (edge: {e})"),
        (None, None) => String::new(),
    }
}

impl ValidationError {
    pub fn new(reason: ValidationReason) -> Self {
        Self {
            reason,
            node_id: None,
            edge_id: None,
        }
    }

    pub fn at_node(
        reason: ValidationReason,
        node_id: impl Into<NodeId>,
    ) -> Self {
        Self {
            reason,
            node_id: Some(node_id.into()),
            edge_id: None,
        }
    }

    pub fn at_edge(
        reason: ValidationReason,
        edge_id: impl Into<EdgeId>,
    ) -> Self {
        Self {
            reason,
            node_id: None,
            edge_id: Some(edge_id.into()),
        }
    }

    pub fn with_node(
        mut self,
        node_id: impl Into<NodeId>,
    ) -> Self {
        self.node_id = Some(node_id.into());
        self
    }
}

/// The specific rule a workflow graph violated.
#[derive(Deserialize, Serialize, Error, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ValidationReason {
    #[error("duplicate node id")]
    DuplicateNodeId,
    #[error("duplicate edge id")]
    DuplicateEdgeId,
    #[error("unknown node kind '{0}'")]
    UnknownKind(String),
    #[error("invalid node data: {0}")]
    InvalidNodeData(String),
    #[error("edge source references a node that does not exist")]
    DanglingSource,
    #[error("edge target references a node that does not exist")]
    DanglingTarget,
    #[error("edge leaving a condition node must carry a branch tag")]
    MissingBranch,
    #[error("invalid branch tag '{0}', expected 'true' or 'false'")]
    InvalidBranch(String),
    #[error("only edges leaving a condition node may carry a branch tag")]
    UnexpectedBranch,
    #[error("condition node has more than one '{0}' edge")]
    DuplicateBranch(Branch),
    #[error("workflow has no trigger node")]
    NoTrigger,
    #[error("trigger node has incoming edges")]
    TriggerHasIncoming,
    #[error("trigger node has no outgoing edges")]
    TriggerHasNoOutgoing,
    #[error("cycle detected in the graph reachable from a trigger")]
    Cycle,
}

/// A condition predicate could not be evaluated against a context.
#[derive(Deserialize, Serialize, Error, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConditionEvaluationError {
    /// The predicate could not be parsed.
    #[error("malformed predicate: {0}")]
    Malformed(String),

    /// The condition config names no predicate form the evaluator understands.
    #[error("unsupported predicate: {0}")]
    Unsupported(String),

    /// A path referenced by the predicate is absent from the context.
    #[error("field '{0}' not found in context")]
    MissingField(String),

    /// Operand types do not support the requested operation.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// The predicate evaluated to something other than a boolean.
    #[error("predicate evaluated to non-boolean value {0}")]
    NotBoolean(String),

    /// Evaluation exceeded the per-call timeout.
    #[error("condition evaluation timed out after {0}ms")]
    Timeout(u64),
}

/// An action dispatch failed.
#[derive(Deserialize, Serialize, Error, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DispatchError {
    /// No handler is registered for the action type.
    #[error("unknown action type '{0}'")]
    UnknownActionType(String),

    /// The action configuration was rejected before the call was made.
    #[error("invalid config for action '{action_type}': {message}")]
    InvalidConfig {
        action_type: String,
        message: String,
    },

    /// The external actor returned an error payload.
    #[error("action '{action_type}' rejected: {message}")]
    Rejected {
        action_type: String,
        message: String,
    },

    /// The call itself failed.
    #[error("action '{action_type}' failed: {message}")]
    Failed {
        action_type: String,
        message: String,
    },

    /// The call did not complete within the per-call timeout.
    #[error("action '{action_type}' timed out after {timeout_ms}ms")]
    Timeout {
        action_type: String,
        timeout_ms: u64,
    },
}

/// Failure recorded against a single node of a run.
#[derive(Deserialize, Serialize, Error, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", content = "detail", rename_all = "snake_case")]
pub enum NodeError {
    #[error("condition error: {0}")]
    Condition(ConditionEvaluationError),
    #[error("dispatch error: {0}")]
    Dispatch(DispatchError),
    #[error("node task panicked: {0}")]
    Panicked(String),
}

impl From<ConditionEvaluationError> for NodeError {
    fn from(error: ConditionEvaluationError) -> Self {
        NodeError::Condition(error)
    }
}

impl From<DispatchError> for NodeError {
    fn from(error: DispatchError) -> Self {
        NodeError::Dispatch(error)
    }
}

/// A node that failed during a run, with the reason.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct NodeFailure {
    pub node_id: NodeId,
    pub error: NodeError,
}

/// Run-level summary of failed nodes.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ExecutionError {
    pub run_id: RunId,
    pub failures: Vec<NodeFailure>,
    pub cancelled: bool,
}

impl fmt::Display for ExecutionError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "run {}", self.run_id)?;
        if self.cancelled {
            write!(f, " was cancelled")?;
            if !self.failures.is_empty() {
                write!(f, " and")?;
            }
        }
        if !self.failures.is_empty() {
            let details: Vec<String> = self.failures.iter().map(|f| format!("{}: {}", f.node_id, f.error)).collect();
            write!(f, " had {} failed node(s): {}", self.failures.len(), details.join("; "))?;
        }
        Ok(())
    }
}

impl std::error::Error for ExecutionError {}

impl From<AutoflowError> for String {
    fn from(val: AutoflowError) -> Self {
        val.to_string()
    }
}

impl From<std::io::Error> for AutoflowError {
    fn from(error: std::io::Error) -> Self {
        AutoflowError::IoError(error.to_string())
    }
}

impl From<AutoflowError> for std::io::Error {
    fn from(val: AutoflowError) -> Self {
        #[allow(clippy::io_other_error)]
        std::io::Error::new(ErrorKind::Other, val.to_string())
    }
}

impl From<serde_json::Error> for AutoflowError {
    fn from(error: serde_json::Error) -> Self {
        AutoflowError::Convert(error.to_string())
    }
}

impl From<toml::de::Error> for AutoflowError {
    fn from(error: toml::de::Error) -> Self {
        AutoflowError::Config(error.to_string())
    }
}
