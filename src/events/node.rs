use crate::NodeError;

#[derive(Debug, Clone)]
pub enum NodeEvent {
    Running(i64),
    Succeeded(i64),
    /// The node sits on a branch its condition parent did not take.
    Skipped,
    Error(NodeError),
    Cancelled(i64),
}

impl NodeEvent {
    pub fn str(&self) -> &str {
        match self {
            NodeEvent::Running(_) => "Running",
            NodeEvent::Succeeded(_) => "Succeeded",
            NodeEvent::Skipped => "Skipped",
            NodeEvent::Error(_) => "Error",
            NodeEvent::Cancelled(_) => "Cancelled",
        }
    }
}
