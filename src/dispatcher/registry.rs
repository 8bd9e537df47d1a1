use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use crate::{
    AutoflowError, DispatchError, Result,
    dispatcher::{ActionDispatcher, ActionResult},
    runtime::Context,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::AsRefStr)]
pub enum ActionStatus {
    Succeeded,
    Failed,
}

/// Output returned by an action handler's run method
#[derive(Debug, Clone, PartialEq)]
pub struct ActionOutput {
    /// action execution status
    pub status: ActionStatus,
    /// value handed to the node's children
    pub value: Value,
    /// failure reported by the external actor
    pub error: Option<String>,
}

impl ActionOutput {
    /// Create a successful action output
    pub fn success(value: Value) -> Self {
        Self {
            status: ActionStatus::Succeeded,
            value,
            error: None,
        }
    }

    /// Create a failed action output
    pub fn failed(error: String) -> Self {
        Self {
            status: ActionStatus::Failed,
            value: Value::Null,
            error: Some(error),
        }
    }
}

#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// Returns the action type this handler serves.
    fn action_type(&self) -> &str;

    /// Returns the JSON schema the action config must satisfy.
    fn schema(&self) -> Value {
        json!({ "type": "object" })
    }

    /// Executes the action.
    ///
    /// # Arguments
    ///
    /// * `config` - The resolved, schema-checked action config.
    /// * `ctx` - The branch [`Context`] of the node.
    ///
    /// # Returns
    ///
    /// `Ok` with a failed [`ActionOutput`] when the external actor answered
    /// with an error, `Err` when the call itself could not be made.
    async fn run(
        &self,
        config: Value,
        ctx: Context,
    ) -> Result<ActionOutput>;
}

struct Registered {
    handler: Arc<dyn ActionHandler>,
    validator: jsonschema::Validator,
}

/// Dispatcher backed by an explicit set of handlers.
#[derive(Default, Clone)]
pub struct ActionRegistry {
    handlers: HashMap<String, Arc<Registered>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in `echo` action.
    pub fn with_builtins() -> Result<Self> {
        Self::new().with(EchoAction)
    }

    /// Register a handler, replacing any handler of the same action type.
    /// Fails when the handler's schema is not a valid JSON schema.
    pub fn register(
        &mut self,
        handler: Arc<dyn ActionHandler>,
    ) -> Result<()> {
        let validator = jsonschema::validator_for(&handler.schema())
            .map_err(|e| AutoflowError::Config(format!("invalid schema for action '{}': {}", handler.action_type(), e)))?;
        self.handlers.insert(
            handler.action_type().to_string(),
            Arc::new(Registered {
                handler,
                validator,
            }),
        );
        Ok(())
    }

    pub fn with(
        mut self,
        handler: impl ActionHandler + 'static,
    ) -> Result<Self> {
        self.register(Arc::new(handler))?;
        Ok(self)
    }

    pub fn contains(
        &self,
        action_type: &str,
    ) -> bool {
        self.handlers.contains_key(action_type)
    }

    pub fn action_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        types.sort();
        types
    }
}

#[async_trait]
impl ActionDispatcher for ActionRegistry {
    async fn dispatch(
        &self,
        action_type: &str,
        config: &Value,
        ctx: Context,
    ) -> std::result::Result<ActionResult, DispatchError> {
        let registered = self.handlers.get(action_type).ok_or_else(|| DispatchError::UnknownActionType(action_type.to_string()))?;

        let config = if config.is_null() { json!({}) } else { config.clone() };
        registered.validator.validate(&config).map_err(|e| DispatchError::InvalidConfig {
            action_type: action_type.to_string(),
            message: e.to_string(),
        })?;

        debug!(run_id = ctx.run_id(), action_type, "dispatching action");

        match registered.handler.run(config, ctx).await {
            Ok(output) => match output.status {
                ActionStatus::Succeeded => Ok(ActionResult::new(output.value)),
                ActionStatus::Failed => Err(DispatchError::Rejected {
                    action_type: action_type.to_string(),
                    message: output.error.unwrap_or_default(),
                }),
            },
            Err(e) => Err(DispatchError::Failed {
                action_type: action_type.to_string(),
                message: e.to_string(),
            }),
        }
    }
}

/// Returns its config as the action value.
pub struct EchoAction;

#[async_trait]
impl ActionHandler for EchoAction {
    fn action_type(&self) -> &str {
        "echo"
    }

    async fn run(
        &self,
        config: Value,
        _ctx: Context,
    ) -> Result<ActionOutput> {
        Ok(ActionOutput::success(config))
    }
}
