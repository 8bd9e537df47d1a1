//! Result tree of a run.
//!
//! A [`RunResult`] mirrors the visited part of the graph: one [`NodeRecord`]
//! per trigger root, each holding the records of the children it started.
//! A node reached through several paths appears once per path.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    AutoflowError, ExecutionError, NodeError, NodeFailure, Result,
    runtime::RunId,
    workflow::{
        edge::{Branch, EdgeId},
        node::{Node, NodeId, NodeKind},
    },
};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, strum::AsRefStr, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RunStatus {
    /// every visited node succeeded
    Succeeded,
    /// at least one node failed; the other subtrees ran to completion
    PartiallyFailed,
    Cancelled,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, strum::AsRefStr, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NodeExecutionStatus {
    Succeeded,
    Failed,
    Cancelled,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NodeRecord {
    pub node_id: NodeId,
    pub kind: NodeKind,
    /// edge this visit came through, `None` for a root
    pub via_edge: Option<EdgeId>,
    pub status: NodeExecutionStatus,
    /// value produced by the node, handed to its children
    pub value: Option<Value>,
    /// branch taken by a condition node
    pub branch: Option<Branch>,
    pub error: Option<NodeError>,
    pub start_time: i64,
    pub end_time: i64,
    pub children: Vec<NodeRecord>,
}

impl NodeRecord {
    pub(crate) fn new(
        node: &Node,
        via_edge: Option<EdgeId>,
        start_time: i64,
    ) -> Self {
        Self {
            node_id: node.id.clone(),
            kind: node.kind(),
            via_edge,
            status: NodeExecutionStatus::Cancelled,
            value: None,
            branch: None,
            error: None,
            start_time,
            end_time: start_time,
            children: Vec::new(),
        }
    }

    pub(crate) fn succeed(
        &mut self,
        value: Value,
        branch: Option<Branch>,
        end_time: i64,
    ) {
        self.status = NodeExecutionStatus::Succeeded;
        self.value = Some(value);
        self.branch = branch;
        self.end_time = end_time;
    }

    pub(crate) fn fail(
        &mut self,
        error: NodeError,
        end_time: i64,
    ) {
        self.status = NodeExecutionStatus::Failed;
        self.error = Some(error);
        self.end_time = end_time;
    }

    pub(crate) fn cancel(
        &mut self,
        end_time: i64,
    ) {
        self.status = NodeExecutionStatus::Cancelled;
        self.end_time = end_time;
    }

    pub fn is_success(&self) -> bool {
        self.status == NodeExecutionStatus::Succeeded
    }

    /// Pre-order walk over this record and its descendants.
    pub fn iter(&self) -> impl Iterator<Item = &NodeRecord> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let record = stack.pop()?;
            stack.extend(record.children.iter().rev());
            Some(record)
        })
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RunResult {
    pub run_id: RunId,
    pub workflow_id: String,
    pub status: RunStatus,
    pub roots: Vec<NodeRecord>,
    pub start_time: i64,
    pub end_time: i64,
}

impl RunResult {
    pub(crate) fn new(
        run_id: RunId,
        workflow_id: String,
        roots: Vec<NodeRecord>,
        cancelled: bool,
        start_time: i64,
        end_time: i64,
    ) -> Self {
        let failed = roots.iter().flat_map(NodeRecord::iter).any(|r| r.status == NodeExecutionStatus::Failed);
        let status = if cancelled {
            RunStatus::Cancelled
        } else if failed {
            RunStatus::PartiallyFailed
        } else {
            RunStatus::Succeeded
        };

        Self {
            run_id,
            workflow_id,
            status,
            roots,
            start_time,
            end_time,
        }
    }

    /// Every visited node record, root by root in pre-order.
    pub fn visited(&self) -> Vec<&NodeRecord> {
        self.roots.iter().flat_map(NodeRecord::iter).collect()
    }

    pub fn visited_ids(&self) -> Vec<&str> {
        self.roots.iter().flat_map(NodeRecord::iter).map(|r| r.node_id.as_str()).collect()
    }

    pub fn was_visited(
        &self,
        nid: &str,
    ) -> bool {
        self.find(nid).is_some()
    }

    /// First record of the node, in pre-order.
    pub fn find(
        &self,
        nid: &str,
    ) -> Option<&NodeRecord> {
        self.roots.iter().flat_map(NodeRecord::iter).find(|r| r.node_id == nid)
    }

    pub fn failures(&self) -> Vec<NodeFailure> {
        self.roots
            .iter()
            .flat_map(NodeRecord::iter)
            .filter_map(|r| {
                r.error.as_ref().map(|error| NodeFailure {
                    node_id: r.node_id.clone(),
                    error: error.clone(),
                })
            })
            .collect()
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Succeeded
    }

    /// Run-level error summary, `None` for a fully successful run.
    pub fn error(&self) -> Option<ExecutionError> {
        if self.is_success() {
            return None;
        }
        Some(ExecutionError {
            run_id: self.run_id.clone(),
            failures: self.failures(),
            cancelled: self.status == RunStatus::Cancelled,
        })
    }

    /// Turn a run with failures or a cancellation into an error.
    pub fn into_result(self) -> Result<RunResult> {
        match self.error() {
            Some(error) => Err(AutoflowError::Execution(error)),
            None => Ok(self),
        }
    }
}
