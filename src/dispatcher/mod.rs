//! Action dispatch.
//!
//! The engine hands every action node to an [`ActionDispatcher`] and awaits
//! the outcome. It makes exactly one call per visit and never retries.
//! [`ActionRegistry`] is the in-process implementation, routing action types
//! to registered [`ActionHandler`]s.

mod registry;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use registry::{ActionHandler, ActionOutput, ActionRegistry, ActionStatus, EchoAction};

use crate::{DispatchError, runtime::Context};

/// Value returned by a successful action call.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ActionResult {
    pub value: Value,
}

impl ActionResult {
    pub fn new(value: Value) -> Self {
        Self {
            value,
        }
    }
}

#[async_trait]
pub trait ActionDispatcher: Send + Sync {
    /// Submit an action and wait for its result.
    ///
    /// `config` has its placeholders already resolved. `ctx` is the branch
    /// context, passed by value.
    async fn dispatch(
        &self,
        action_type: &str,
        config: &Value,
        ctx: Context,
    ) -> std::result::Result<ActionResult, DispatchError>;
}
