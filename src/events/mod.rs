//! Event types for workflow execution.
//!
//! Events are emitted during a run to notify subscribers about run and node
//! state changes. They are delivered through the [`Channel`](crate::Channel).

mod node;
mod run;

pub use node::*;
pub use run::*;

use crate::{runtime::RunId, workflow::node::NodeId};

/// Generic event wrapper.
#[derive(Debug, Clone)]
pub struct Event<T> {
    inner: T,
}

/// Top-level event type for workflow graph events.
#[derive(Debug, Clone)]
pub enum GraphEvent {
    /// Run-level events (started, succeeded, partially failed, cancelled).
    Run(RunEvent),
    /// Node-level events (running, succeeded, skipped, error, cancelled).
    Node(NodeEvent),
}

/// Event message containing run and node context.
#[derive(Debug, Clone)]
pub struct Message {
    /// Run that generated this event.
    pub rid: RunId,
    /// Node that generated this event (empty for run events).
    pub nid: NodeId,
    /// The actual event data.
    pub event: GraphEvent,
}

impl<T> std::ops::Deref for Event<T>
where
    T: std::fmt::Debug + Clone,
{
    type Target = T;
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<T> Event<T>
where
    T: std::fmt::Debug + Clone,
{
    pub fn new(inner: &T) -> Self {
        Self {
            inner: inner.clone(),
        }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

impl GraphEvent {
    /// The run reached a terminal state.
    pub fn is_complete(&self) -> bool {
        matches!(self, GraphEvent::Run(RunEvent::Succeeded | RunEvent::PartiallyFailed(_) | RunEvent::Cancelled(_)))
    }

    /// A node failed or the run finished with failures.
    pub fn is_error(&self) -> bool {
        matches!(self, GraphEvent::Node(NodeEvent::Error(_)) | GraphEvent::Run(RunEvent::PartiallyFailed(_)))
    }

    pub fn str(&self) -> &str {
        match self {
            GraphEvent::Run(e) => e.str(),
            GraphEvent::Node(e) => e.str(),
        }
    }
}
