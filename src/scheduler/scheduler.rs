//! Run scheduler for executing the nodes of one run.
//!
//! The scheduler is responsible for:
//! - Starting every root trigger concurrently
//! - Executing a node once its parent's value is available
//! - Following only the branch a condition node selected
//! - Bounding every dispatch/evaluation call with a timeout
//! - Stopping suspended nodes when the run is cancelled
//!
//! Each visit of a node is its own spawned task. A parent task spawns all of
//! its children at once and awaits them in edge order to assemble its
//! [`NodeRecord`]. A failure ends the failing node's subtree only.

use std::{sync::Arc, time::Duration};

use futures::future::BoxFuture;
use petgraph::graph::NodeIndex;
use serde_json::Value;
use tokio::{
    runtime::Handle,
    sync::{OwnedSemaphorePermit, Semaphore},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    ConditionEvaluationError, DispatchError, NodeError,
    common::Shutdown,
    dispatcher::ActionDispatcher,
    events::{GraphEvent, NodeEvent, RunCancelledEvent, RunEvent, RunFailedEvent, RunStartedEvent},
    runtime::{Channel, Context, NodeRecord, RunId, RunResult, RunStatus},
    utils,
    workflow::{
        Workflow,
        condition::ConditionEvaluator,
        edge::{Branch, EdgeId},
        node::{ActionConfig, ConditionConfig, Node, NodeConfig},
        template,
    },
};

enum Outcome {
    Done(Value, Option<Branch>),
    Failed(NodeError),
    Cancelled,
}

pub(crate) struct RunScheduler {
    run_id: RunId,
    workflow: Arc<Workflow>,
    dispatcher: Arc<dyn ActionDispatcher>,
    evaluator: Arc<dyn ConditionEvaluator>,
    channel: Arc<Channel>,
    /// Engine-wide bound on in-flight calls.
    permits: Option<Arc<Semaphore>>,
    node_timeout: Duration,
    shutdown: Arc<Shutdown>,
    runtime: Handle,
}

impl RunScheduler {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        run_id: RunId,
        workflow: Arc<Workflow>,
        dispatcher: Arc<dyn ActionDispatcher>,
        evaluator: Arc<dyn ConditionEvaluator>,
        channel: Arc<Channel>,
        permits: Option<Arc<Semaphore>>,
        node_timeout: Duration,
        shutdown: Arc<Shutdown>,
        runtime: Handle,
    ) -> Self {
        Self {
            run_id,
            workflow,
            dispatcher,
            evaluator,
            channel,
            permits,
            node_timeout,
            shutdown,
            runtime,
        }
    }

    /// Execute the run from the given trigger roots until every reachable
    /// branch has finished, failed or been cancelled.
    pub(crate) async fn run(
        self: Arc<Self>,
        roots: Vec<NodeIndex>,
        initial: Value,
    ) -> RunResult {
        let start_time = utils::time::time_millis();
        let root_ids = roots.iter().map(|idx| self.workflow.node_at(*idx).id.clone()).collect();

        info!(run_id = %self.run_id, workflow_id = self.workflow.id(), roots = roots.len(), "run started");
        self.emit(
            "",
            GraphEvent::Run(RunEvent::Started(RunStartedEvent {
                workflow_id: self.workflow.id().to_string(),
                roots: root_ids,
            })),
        );

        let env = self.workflow.env().clone();
        let handles: Vec<(NodeIndex, JoinHandle<NodeRecord>)> = roots
            .into_iter()
            .map(|idx| {
                let ctx = Context::new(self.run_id.clone(), initial.clone(), env.clone());
                (idx, self.spawn_node(idx, ctx, None))
            })
            .collect();

        let mut records = Vec::with_capacity(handles.len());
        for (idx, handle) in handles {
            records.push(self.join_node(idx, None, handle).await);
        }

        let result = RunResult::new(
            self.run_id.clone(),
            self.workflow.id().to_string(),
            records,
            self.shutdown.is_terminated(),
            start_time,
            utils::time::time_millis(),
        );

        match result.status {
            RunStatus::Succeeded => {
                info!(run_id = %self.run_id, "run succeeded");
                self.emit("", GraphEvent::Run(RunEvent::Succeeded));
            }
            RunStatus::PartiallyFailed => {
                let error = result.error().map(|e| e.to_string()).unwrap_or_default();
                warn!(run_id = %self.run_id, %error, "run finished with failures");
                self.emit(
                    "",
                    GraphEvent::Run(RunEvent::PartiallyFailed(RunFailedEvent {
                        error,
                    })),
                );
            }
            RunStatus::Cancelled => {
                info!(run_id = %self.run_id, "run cancelled");
                self.emit(
                    "",
                    GraphEvent::Run(RunEvent::Cancelled(RunCancelledEvent {
                        reason: "cancelled by request".to_string(),
                    })),
                );
            }
        }

        result
    }

    fn spawn_node(
        self: &Arc<Self>,
        idx: NodeIndex,
        ctx: Context,
        via_edge: Option<EdgeId>,
    ) -> JoinHandle<NodeRecord> {
        self.runtime.spawn(self.clone().execute_node(idx, ctx, via_edge))
    }

    /// Await a node task. A task that panicked becomes a failed record.
    async fn join_node(
        &self,
        idx: NodeIndex,
        via_edge: Option<EdgeId>,
        handle: JoinHandle<NodeRecord>,
    ) -> NodeRecord {
        match handle.await {
            Ok(record) => record,
            Err(err) => {
                let node = self.workflow.node_at(idx);
                warn!(run_id = %self.run_id, node_id = %node.id, error = %err, "node task aborted");
                let now = utils::time::time_millis();
                let mut record = NodeRecord::new(node, via_edge, now);
                record.fail(NodeError::Panicked(err.to_string()), now);
                record
            }
        }
    }

    fn execute_node(
        self: Arc<Self>,
        idx: NodeIndex,
        ctx: Context,
        via_edge: Option<EdgeId>,
    ) -> BoxFuture<'static, NodeRecord> {
        Box::pin(async move {
            let workflow = self.workflow.clone();
            let node = workflow.node_at(idx);
            let start_time = utils::time::time_millis();
            let mut record = NodeRecord::new(node, via_edge, start_time);

            if self.shutdown.is_terminated() {
                self.emit(&node.id, GraphEvent::Node(NodeEvent::Cancelled(start_time)));
                return record;
            }

            debug!(run_id = %self.run_id, node_id = %node.id, kind = %node.kind(), "node running");
            self.emit(&node.id, GraphEvent::Node(NodeEvent::Running(start_time)));

            let outcome = match &node.config {
                // the activation payload seeds the trigger's subtree
                NodeConfig::Trigger(_) => Outcome::Done(ctx.initial().clone(), None),
                NodeConfig::Action(action) => self.run_action(node, action, &ctx).await,
                NodeConfig::Condition(condition) => self.run_condition(node, condition, &ctx).await,
            };

            let end_time = utils::time::time_millis();
            let (value, branch) = match outcome {
                Outcome::Done(value, branch) => (value, branch),
                Outcome::Failed(error) => {
                    warn!(run_id = %self.run_id, node_id = %node.id, %error, "node failed");
                    self.emit(&node.id, GraphEvent::Node(NodeEvent::Error(error.clone())));
                    record.fail(error, end_time);
                    return record;
                }
                Outcome::Cancelled => {
                    debug!(run_id = %self.run_id, node_id = %node.id, "node cancelled");
                    self.emit(&node.id, GraphEvent::Node(NodeEvent::Cancelled(end_time)));
                    record.cancel(end_time);
                    return record;
                }
            };

            debug!(run_id = %self.run_id, node_id = %node.id, branch = ?branch, "node succeeded");
            self.emit(&node.id, GraphEvent::Node(NodeEvent::Succeeded(end_time)));
            record.succeed(value.clone(), branch, end_time);

            if self.shutdown.is_terminated() {
                return record;
            }

            let mut children = Vec::new();
            for (edge, target) in workflow.outgoing(idx) {
                if !edge.follows(branch) {
                    self.emit(&edge.target, GraphEvent::Node(NodeEvent::Skipped));
                    continue;
                }
                if self.shutdown.is_terminated() {
                    break;
                }
                let child_ctx = ctx.derive(&node.id, value.clone());
                children.push((target, edge.id.clone(), self.spawn_node(target, child_ctx, Some(edge.id.clone()))));
            }

            for (target, edge_id, handle) in children {
                record.children.push(self.join_node(target, Some(edge_id), handle).await);
            }

            record
        })
    }

    async fn run_action(
        &self,
        node: &Node,
        action: &ActionConfig,
        ctx: &Context,
    ) -> Outcome {
        let action_type = action.action_type.as_str();
        let timeout = node.timeout.unwrap_or(self.node_timeout);

        let config = match template::resolve_json_value(ctx, &action.config) {
            Ok(config) => config,
            Err(e) => {
                return Outcome::Failed(
                    DispatchError::InvalidConfig {
                        action_type: action_type.to_string(),
                        message: e.to_string(),
                    }
                    .into(),
                );
            }
        };

        let Some(_permit) = self.acquire().await else {
            return Outcome::Cancelled;
        };

        let call = self.dispatcher.dispatch(action_type, &config, ctx.clone());
        tokio::select! {
            _ = self.shutdown.wait() => Outcome::Cancelled,
            res = tokio::time::timeout(timeout, call) => match res {
                Ok(Ok(result)) => Outcome::Done(result.value, None),
                Ok(Err(error)) => Outcome::Failed(error.into()),
                Err(_) => Outcome::Failed(
                    DispatchError::Timeout {
                        action_type: action_type.to_string(),
                        timeout_ms: timeout.as_millis() as u64,
                    }
                    .into(),
                ),
            },
        }
    }

    /// A condition passes its parent's value through to the selected branch.
    async fn run_condition(
        &self,
        node: &Node,
        condition: &ConditionConfig,
        ctx: &Context,
    ) -> Outcome {
        let timeout = node.timeout.unwrap_or(self.node_timeout);

        let Some(_permit) = self.acquire().await else {
            return Outcome::Cancelled;
        };

        let config = condition.clone();
        let eval_ctx = ctx.clone();
        let evaluator = self.evaluator.clone();
        let task = self.runtime.spawn_blocking(move || evaluator.evaluate(&config, &eval_ctx));

        tokio::select! {
            _ = self.shutdown.wait() => Outcome::Cancelled,
            res = tokio::time::timeout(timeout, task) => match res {
                Ok(Ok(Ok(passed))) => Outcome::Done(ctx.parent_result().clone(), Some(Branch::from(passed))),
                Ok(Ok(Err(error))) => Outcome::Failed(error.into()),
                Ok(Err(join)) => Outcome::Failed(NodeError::Panicked(join.to_string())),
                Err(_) => Outcome::Failed(ConditionEvaluationError::Timeout(timeout.as_millis() as u64).into()),
            },
        }
    }

    /// Wait for a concurrency permit. `None` when the run is cancelled first.
    async fn acquire(&self) -> Option<Option<OwnedSemaphorePermit>> {
        let Some(permits) = &self.permits else {
            return Some(None);
        };

        tokio::select! {
            _ = self.shutdown.wait() => None,
            permit = permits.clone().acquire_owned() => Some(permit.ok()),
        }
    }

    fn emit(
        &self,
        nid: &str,
        event: GraphEvent,
    ) {
        self.channel.emit(&self.run_id, nid, event);
    }
}
