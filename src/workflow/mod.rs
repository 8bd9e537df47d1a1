pub mod condition;
pub mod edge;
pub mod node;
pub mod template;
pub mod validator;
mod workflow;

pub use workflow::Workflow;
