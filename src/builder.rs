use std::{sync::Arc, time::Duration};

use tokio::runtime::{Builder, Handle};

use crate::{
    ActionRegistry, Config, Engine, Result,
    dispatcher::ActionDispatcher,
    workflow::condition::{ConditionEvaluator, PredicateEvaluator},
};

/// Builder for [`Engine`].
///
/// The engine runs on the runtime passed to [`EngineBuilder::runtime`], else on
/// the runtime `build` is called from. Outside of any runtime it creates its
/// own multi-threaded one.
#[derive(Default)]
pub struct EngineBuilder {
    config: Config,
    dispatcher: Option<Arc<dyn ActionDispatcher>>,
    evaluator: Option<Arc<dyn ConditionEvaluator>>,
    rt: Option<Handle>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(
        mut self,
        config: Config,
    ) -> Self {
        self.config = config;
        self
    }

    pub fn node_timeout(
        mut self,
        timeout: Duration,
    ) -> Self {
        self.config.node_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn max_concurrent_nodes(
        mut self,
        n: usize,
    ) -> Self {
        self.config.max_concurrent_nodes = n;
        self
    }

    pub fn async_worker_thread_number(
        mut self,
        n: u16,
    ) -> Self {
        self.config.async_worker_thread_number = n;
        self
    }

    /// Dispatcher for action nodes. Defaults to an
    /// [`ActionRegistry`] with the built-in actions.
    pub fn dispatcher(
        mut self,
        dispatcher: Arc<dyn ActionDispatcher>,
    ) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Evaluator for condition nodes. Defaults to [`PredicateEvaluator`].
    pub fn evaluator(
        mut self,
        evaluator: Arc<dyn ConditionEvaluator>,
    ) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    pub fn runtime(
        mut self,
        runtime: Handle,
    ) -> Self {
        self.rt = Some(runtime);
        self
    }

    pub fn build(&self) -> Result<Engine> {
        let (handle, owned) = match self.rt.clone().or_else(|| Handle::try_current().ok()) {
            Some(handle) => (handle, None),
            None => {
                let runtime = Arc::new(Builder::new_multi_thread().worker_threads(self.config.async_worker_thread_number.max(1).into()).enable_all().build()?);
                (runtime.handle().clone(), Some(runtime))
            }
        };

        let dispatcher: Arc<dyn ActionDispatcher> = match &self.dispatcher {
            Some(dispatcher) => dispatcher.clone(),
            None => Arc::new(ActionRegistry::with_builtins()?),
        };
        let evaluator = self.evaluator.clone().unwrap_or_else(|| Arc::new(PredicateEvaluator));

        Ok(Engine::new(self.config.clone(), dispatcher, evaluator, handle, owned))
    }
}
