//! # Autoflow
//!
//! Autoflow executes automation workflows: directed graphs of trigger, action
//! and condition nodes, authored as JSON and validated before they run.
//!
//! ## Core Features
//!
//! - **Validated Graphs**: Structural defects such as cycles, dangling edges or missing branches are rejected before any side effect
//! - **Branch-Parallel Execution**: Every trigger is a root, sibling subtrees run concurrently on `tokio`
//! - **Isolated Contexts**: Each branch receives its own copy of the execution context
//! - **Fault Isolation**: A failing node ends its own subtree only
//! - **Pluggable Actions and Triggers**: Actions go through an [`ActionDispatcher`], triggers through a [`TriggerSource`]
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use autoflow::{ActionRegistry, EngineBuilder, WorkflowModel};
//!
//! let registry = ActionRegistry::with_builtins()?.with(SendEmail)?;
//! let engine = EngineBuilder::new().dispatcher(Arc::new(registry)).build()?;
//!
//! let model = WorkflowModel::from_json(json_str)?;
//! let result = engine.execute_workflow(&model, Some(json!({"from": "a@b.c"}))).await?;
//! println!("{:?}", result.visited_ids());
//! ```

mod builder;
mod common;
mod config;
mod dispatcher;
mod engine;
mod error;
pub mod events;
mod model;
mod runtime;
mod scheduler;
mod trigger;
mod utils;
pub mod workflow;

use std::sync::{Arc, RwLock};

pub use builder::EngineBuilder;
pub use common::{Shutdown, Vars};
pub use config::Config;
pub use dispatcher::{ActionDispatcher, ActionHandler, ActionOutput, ActionRegistry, ActionResult, ActionStatus, EchoAction};
pub use engine::Engine;
pub use error::{AutoflowError, ConditionEvaluationError, DispatchError, ExecutionError, NodeError, NodeFailure, ValidationError, ValidationReason};
pub use model::*;
pub use runtime::{Channel, ChannelEvent, ChannelOptions, Context, NodeExecutionStatus, NodeRecord, RunHandle, RunId, RunResult, RunStatus};
pub use trigger::{Activation, ArmedWorkflow, FireFn, IntervalTrigger, ManualTrigger, Subscription, TriggerManager, TriggerSource};
pub use workflow::{
    Workflow,
    condition::{ConditionEvaluator, PredicateEvaluator},
    validator::{validate, validate_workflow},
};

/// Result type alias for Autoflow operations.
pub type Result<T> = std::result::Result<T, AutoflowError>;

/// Thread-safe shared lock wrapper using Arc<RwLock<T>>.
pub(crate) type ShareLock<T> = Arc<RwLock<T>>;
