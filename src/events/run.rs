use crate::workflow::node::NodeId;

#[derive(Debug, Clone)]
pub enum RunEvent {
    Started(RunStartedEvent),
    Succeeded,
    PartiallyFailed(RunFailedEvent),
    Cancelled(RunCancelledEvent),
}

impl RunEvent {
    pub fn str(&self) -> &str {
        match self {
            RunEvent::Started(_) => "Running",
            RunEvent::Succeeded => "Succeeded",
            RunEvent::PartiallyFailed(_) => "PartiallyFailed",
            RunEvent::Cancelled(_) => "Cancelled",
        }
    }
}

/// Event emitted when a run starts
#[derive(Debug, Clone)]
pub struct RunStartedEvent {
    pub workflow_id: String,
    /// Trigger nodes the run starts from
    pub roots: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct RunFailedEvent {
    pub error: String,
}

#[derive(Debug, Clone)]
pub struct RunCancelledEvent {
    pub reason: String,
}
