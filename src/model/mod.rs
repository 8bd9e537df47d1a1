//! Workflow graph exchange format, as produced by the authoring surface.

mod edge;
mod node;
mod workflow;

pub use edge::EdgeModel;
pub use node::NodeModel;
pub use workflow::WorkflowModel;
