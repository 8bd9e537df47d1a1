//! Traversal of a validated workflow for a single run.

mod scheduler;

pub(crate) use scheduler::RunScheduler;
