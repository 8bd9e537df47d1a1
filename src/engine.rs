//! Workflow engine - the main entry point for Autoflow.
//!
//! The engine validates workflow graphs and runs them:
//! - every trigger node is an independent root, all roots start concurrently
//! - each node visit is a task that starts once its parent's value is ready
//! - a failure ends only the failing node's subtree
//! - runs can be cancelled one by one or all together on shutdown
//!
//! Lifecycle events of every run are published on the event [`Channel`].


use std::sync::Arc;

use serde_json::Value;
use tokio::{
    runtime::{Handle, Runtime},
    sync::Semaphore,
};
use tracing::debug;

use crate::{
    AutoflowError, Config, Result,
    common::{MemCache, Shutdown},
    dispatcher::ActionDispatcher,
    model::WorkflowModel,
    runtime::{Channel, RunHandle, RunId, RunResult},
    scheduler::RunScheduler,
    utils,
    workflow::{Workflow, condition::ConditionEvaluator, validator},
};

/// The workflow engine.
///
/// Engine is cheap to clone; clones share the dispatcher, the event channel
/// and the table of active runs.
///
/// # Example
///
/// ```rust,ignore
/// let engine = EngineBuilder::new().dispatcher(Arc::new(registry)).build()?;
///
/// // Validate and run to completion
/// let result = engine.execute_workflow(&model, Some(json!({"from": "a@b.c"}))).await?;
///
/// // Or start in the background
/// let workflow = Arc::new(engine.validate(&model)?);
/// let handle = engine.start(workflow, Value::Null)?;
/// handle.cancel();
/// ```
#[derive(Clone)]
pub struct Engine {
    config: Config,
    /// Dispatcher for action nodes.
    dispatcher: Arc<dyn ActionDispatcher>,
    /// Evaluator for condition nodes.
    evaluator: Arc<dyn ConditionEvaluator>,
    /// Event channel for broadcasting run events.
    channel: Arc<Channel>,
    /// Cancellation signal of every active run.
    runs: Arc<MemCache<RunId, Arc<Shutdown>>>,
    /// Bound on in-flight action/condition calls, if configured.
    permits: Option<Arc<Semaphore>>,

    /// Runtime the runs are spawned on.
    runtime: Handle,
    /// Keeps a runtime created by the builder alive.
    _owned_runtime: Option<Arc<Runtime>>,
    /// Shutdown coordinator for graceful termination.
    shutdown: Arc<Shutdown>,
}

impl Engine {
    pub(crate) fn new(
        config: Config,
        dispatcher: Arc<dyn ActionDispatcher>,
        evaluator: Arc<dyn ConditionEvaluator>,
        runtime: Handle,
        owned_runtime: Option<Arc<Runtime>>,
    ) -> Self {
        let channel = Arc::new(Channel::new(runtime.clone(), config.event_queue_size));
        channel.listen();

        let permits = (config.max_concurrent_nodes > 0).then(|| Arc::new(Semaphore::new(config.max_concurrent_nodes)));

        Self {
            runs: Arc::new(MemCache::new()),
            config,
            dispatcher,
            evaluator,
            channel,
            permits,
            runtime,
            _owned_runtime: owned_runtime,
            shutdown: Arc::new(Shutdown::new()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Validate a workflow model into a runnable [`Workflow`].
    pub fn validate(
        &self,
        model: &WorkflowModel,
    ) -> Result<Workflow> {
        Ok(validator::validate(model)?)
    }

    /// Validate a workflow and run it to completion.
    ///
    /// Every trigger is a root and receives `initial` as its payload. A graph
    /// that fails validation is rejected before any node runs. Node failures do
    /// not make this an error; they are recorded in the returned [`RunResult`].
    pub async fn execute_workflow(
        &self,
        model: &WorkflowModel,
        initial: Option<Value>,
    ) -> Result<RunResult> {
        let workflow = Arc::new(self.validate(model)?);
        self.start(workflow, initial.unwrap_or(Value::Null))?.wait().await
    }

    /// Start a run from every trigger without waiting for it.
    pub fn start(
        &self,
        workflow: Arc<Workflow>,
        initial: Value,
    ) -> Result<RunHandle> {
        let roots = workflow.trigger_indices().to_vec();
        self.launch(workflow, roots, initial)
    }

    /// Start a run for one firing of a single trigger.
    pub fn start_from_trigger(
        &self,
        workflow: Arc<Workflow>,
        trigger_id: &str,
        payload: Value,
    ) -> Result<RunHandle> {
        let idx = workflow
            .index_of(trigger_id)
            .filter(|idx| workflow.node_at(*idx).is_trigger())
            .ok_or_else(|| AutoflowError::Engine(format!("node {} is not a trigger of workflow {}", trigger_id, workflow.id())))?;

        self.launch(workflow, vec![idx], payload)
    }

    fn launch(
        &self,
        workflow: Arc<Workflow>,
        roots: Vec<petgraph::graph::NodeIndex>,
        initial: Value,
    ) -> Result<RunHandle> {
        if self.shutdown.is_terminated() {
            return Err(AutoflowError::Engine("Engine is shut down".to_string()));
        }

        let run_id = utils::longid();
        let run_shutdown = Arc::new(Shutdown::new());
        self.runs.set(run_id.clone(), run_shutdown.clone());
        // shutdown may have swept the table before this run was added
        if self.shutdown.is_terminated() {
            run_shutdown.shutdown();
        }

        debug!(run_id = %run_id, workflow_id = workflow.id(), "launching run");

        let scheduler = Arc::new(RunScheduler::new(
            run_id.clone(),
            workflow,
            self.dispatcher.clone(),
            self.evaluator.clone(),
            self.channel.clone(),
            self.permits.clone(),
            self.config.node_timeout(),
            run_shutdown.clone(),
            self.runtime.clone(),
        ));

        let runs = self.runs.clone();
        let rid = run_id.clone();
        let join = self.runtime.spawn(async move {
            let result = scheduler.run(roots, initial).await;
            runs.remove(&rid);
            result
        });

        Ok(RunHandle::new(run_id, run_shutdown, join))
    }

    /// Cancel an active run by id.
    pub fn cancel(
        &self,
        run_id: &str,
    ) -> Result<()> {
        match self.runs.get(&run_id.to_string()) {
            Some(shutdown) => {
                shutdown.shutdown();
                Ok(())
            }
            None => Err(AutoflowError::Engine(format!("Run {} not found", run_id))),
        }
    }

    /// Cancel every active run, refuse new ones and stop the event channel.
    pub fn shutdown(&self) {
        self.shutdown.shutdown();
        for (_, run) in self.runs.iter() {
            run.shutdown();
        }
        self.channel.shutdown();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_terminated()
    }

    /// Number of runs that have not finished yet.
    pub fn active_runs(&self) -> u64 {
        self.runs.len()
    }

    /// Returns a reference to the event channel.
    pub fn channel(&self) -> Arc<Channel> {
        self.channel.clone()
    }
}
