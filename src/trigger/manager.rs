use std::{collections::HashMap, sync::Arc};

use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    AutoflowError, Config, Engine, Result,
    common::{Queue, Shutdown},
    runtime::RunHandle,
    utils,
    workflow::{
        Workflow,
        node::{NodeConfig, NodeId},
    },
};

const DEFAULT_QUEUE_SIZE: usize = 1024;

/// Callback a source invokes with the payload of every firing.
pub type FireFn = Arc<dyn Fn(Value) + Send + Sync>;

pub trait TriggerSource: Send + Sync {
    /// Returns the trigger type this source serves.
    fn trigger_type(&self) -> &str;

    /// Arm the source with the trigger's config.
    ///
    /// The source calls `on_fire` for every occurrence of its event until
    /// `shutdown` is signalled. Arming is one-time setup and must not block.
    fn arm(
        &self,
        config: &Value,
        on_fire: FireFn,
        shutdown: Arc<Shutdown>,
    ) -> Result<()>;
}

/// One firing of an armed trigger.
#[derive(Debug, Clone, PartialEq)]
pub struct Activation {
    pub trigger_type: String,
    pub payload: Value,
    pub fired_at: i64,
}

/// Stream of activations of an armed trigger.
pub struct Subscription {
    id: String,
    trigger_type: String,
    queue: Arc<Queue<Activation>>,
    shutdown: Arc<Shutdown>,
}

impl Subscription {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn trigger_type(&self) -> &str {
        &self.trigger_type
    }

    /// Wait for the next activation. `None` once the subscription is cancelled.
    pub async fn next(&self) -> Option<Activation> {
        if self.shutdown.is_terminated() {
            return None;
        }
        tokio::select! {
            _ = self.shutdown.wait() => None,
            activation = self.queue.next_async() => activation,
        }
    }

    pub fn try_next(&self) -> Option<Activation> {
        self.queue.try_next()
    }

    /// Disarm the trigger.
    pub fn cancel(&self) {
        self.shutdown.shutdown();
    }

    pub fn is_cancelled(&self) -> bool {
        self.shutdown.is_terminated()
    }
}

/// All triggers of a workflow, armed to start engine runs.
pub struct ArmedWorkflow {
    workflow_id: String,
    triggers: Vec<NodeId>,
    shutdown: Arc<Shutdown>,
}

impl ArmedWorkflow {
    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    pub fn triggers(&self) -> &[NodeId] {
        &self.triggers
    }

    /// Stop starting runs. Runs already started are unaffected.
    pub fn disarm(&self) {
        self.shutdown.shutdown();
    }

    pub fn is_armed(&self) -> bool {
        !self.shutdown.is_terminated()
    }
}

/// Registry of trigger sources by trigger type.
#[derive(Clone)]
pub struct TriggerManager {
    sources: HashMap<String, Arc<dyn TriggerSource>>,
    queue_size: usize,
}

impl Default for TriggerManager {
    fn default() -> Self {
        Self {
            sources: HashMap::new(),
            queue_size: DEFAULT_QUEUE_SIZE,
        }
    }
}

impl TriggerManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Manager sized by the engine [`Config`].
    pub fn from_config(config: &Config) -> Self {
        Self::new().queue_size(config.subscription_queue_size)
    }

    /// Capacity of each subscription queue; activations beyond it are dropped.
    pub fn queue_size(
        mut self,
        size: usize,
    ) -> Self {
        self.queue_size = size.max(1);
        self
    }

    pub fn register(
        &mut self,
        source: Arc<dyn TriggerSource>,
    ) {
        self.sources.insert(source.trigger_type().to_string(), source);
    }

    pub fn with(
        mut self,
        source: impl TriggerSource + 'static,
    ) -> Self {
        self.register(Arc::new(source));
        self
    }

    pub fn contains(
        &self,
        trigger_type: &str,
    ) -> bool {
        self.sources.contains_key(trigger_type)
    }

    /// Arm a trigger and receive its activations on a [`Subscription`].
    pub fn arm(
        &self,
        trigger_type: &str,
        config: &Value,
    ) -> Result<Subscription> {
        self.arm_filtered(trigger_type, config, None)
    }

    /// Like [`TriggerManager::arm`], only delivering payloads that contain
    /// every field of `filter` with an equal value.
    pub fn arm_filtered(
        &self,
        trigger_type: &str,
        config: &Value,
        filter: Option<Value>,
    ) -> Result<Subscription> {
        let queue = Queue::new(self.queue_size);
        let shutdown = Arc::new(Shutdown::new());

        let sink = queue.clone();
        let kind = trigger_type.to_string();
        let on_fire: FireFn = Arc::new(move |payload| {
            let activation = Activation {
                trigger_type: kind.clone(),
                payload,
                fired_at: utils::time::time_millis(),
            };
            if sink.send(activation).is_err() {
                warn!(trigger_type = %kind, "subscription queue full, activation dropped");
            }
        });

        self.arm_source(trigger_type, config, filter, on_fire, shutdown.clone())?;

        Ok(Subscription {
            id: utils::longid(),
            trigger_type: trigger_type.to_string(),
            queue,
            shutdown,
        })
    }

    /// Arm every trigger node of `workflow`. Each firing starts a run from
    /// that trigger alone, with the activation payload as its initial value,
    /// and hands the run to `on_run`.
    pub fn arm_workflow(
        &self,
        engine: &Engine,
        workflow: Arc<Workflow>,
        on_run: impl Fn(RunHandle) + Send + Sync + 'static,
    ) -> Result<ArmedWorkflow> {
        let shutdown = Arc::new(Shutdown::new());
        let on_run: Arc<dyn Fn(RunHandle) + Send + Sync> = Arc::new(on_run);
        let mut triggers = Vec::new();

        for node in workflow.triggers() {
            let NodeConfig::Trigger(trigger) = &node.config else {
                continue;
            };

            let engine = engine.clone();
            let wf = workflow.clone();
            let trigger_id = node.id.clone();
            let on_run = on_run.clone();
            let on_fire: FireFn = Arc::new(move |payload| match engine.start_from_trigger(wf.clone(), &trigger_id, payload) {
                Ok(handle) => {
                    debug!(run_id = handle.id(), trigger_id = %trigger_id, "trigger fired");
                    on_run(handle);
                }
                Err(e) => warn!(trigger_id = %trigger_id, error = %e, "failed to start run"),
            });

            if let Err(e) = self.arm_source(&trigger.trigger_type, &trigger.config, trigger.filter.clone(), on_fire, shutdown.clone()) {
                shutdown.shutdown();
                return Err(e);
            }
            triggers.push(node.id.clone());
        }

        Ok(ArmedWorkflow {
            workflow_id: workflow.id().to_string(),
            triggers,
            shutdown,
        })
    }

    fn arm_source(
        &self,
        trigger_type: &str,
        config: &Value,
        filter: Option<Value>,
        on_fire: FireFn,
        shutdown: Arc<Shutdown>,
    ) -> Result<()> {
        let source = self.sources.get(trigger_type).ok_or_else(|| AutoflowError::Trigger(format!("unknown trigger type '{}'", trigger_type)))?;

        let guard = shutdown.clone();
        let filtered: FireFn = Arc::new(move |payload| {
            if guard.is_terminated() {
                return;
            }
            if filter.as_ref().is_none_or(|f| matches_filter(&payload, f)) {
                on_fire(payload);
            }
        });

        source.arm(config, filtered, shutdown)
    }
}

/// Whether `payload` contains `filter`: objects match field by field,
/// anything else by equality.
fn matches_filter(
    payload: &Value,
    filter: &Value,
) -> bool {
    match (payload, filter) {
        (Value::Object(p), Value::Object(f)) => f.iter().all(|(k, fv)| p.get(k).is_some_and(|pv| matches_filter(pv, fv))),
        _ => payload == filter,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::{EngineBuilder, RunStatus, WorkflowModel, trigger::ManualTrigger};

    #[test]
    fn test_filter_matching() {
        let payload = json!({"from": "a@b.c", "meta": {"folder": "inbox", "size": 3}});
        assert!(matches_filter(&payload, &json!({})));
        assert!(matches_filter(&payload, &json!({"meta": {"folder": "inbox"}})));
        assert!(!matches_filter(&payload, &json!({"meta": {"folder": "spam"}})));
        assert!(!matches_filter(&payload, &json!({"to": "x"})));
    }

    #[tokio::test]
    async fn test_subscription_receives_filtered_activations() {
        let manual = ManualTrigger::new();
        let manager = TriggerManager::from_config(&Config::default()).with(manual.clone());

        let sub = manager.arm_filtered("manual", &Value::Null, Some(json!({"folder": "inbox"}))).unwrap();
        manual.fire(json!({"folder": "spam"}));
        manual.fire(json!({"folder": "inbox", "id": 1}));

        let activation = tokio::time::timeout(Duration::from_secs(1), sub.next()).await.unwrap().unwrap();
        assert_eq!(activation.trigger_type, "manual");
        assert_eq!(activation.payload["id"], 1);
        assert!(sub.try_next().is_none());

        sub.cancel();
        assert!(sub.next().await.is_none());
        manual.fire(json!({"folder": "inbox"}));
        assert!(sub.try_next().is_none());
    }

    #[test]
    fn test_unknown_trigger_type() {
        let manager = TriggerManager::new();
        assert!(matches!(manager.arm("webhook", &Value::Null), Err(AutoflowError::Trigger(_))));
    }

    #[tokio::test]
    async fn test_arm_workflow_starts_runs() {
        let manual = ManualTrigger::new();
        let manager = TriggerManager::new().with(manual.clone());
        let engine = EngineBuilder::new().build().unwrap();

        let model = WorkflowModel::from_json(
            r#"{
                "id": "wf",
                "nodes": [
                    {"id": "t", "kind": "trigger", "data": {"type": "manual", "filter": {"kind": "order"}}},
                    {"id": "a", "kind": "action", "data": {"type": "echo", "config": {"order": "{{#initial.id#}}"}}}
                ],
                "edges": [{"id": "e1", "source": "t", "target": "a"}]
            }"#,
        )
        .unwrap();
        let workflow = Arc::new(engine.validate(&model).unwrap());

        let (tx, rx) = flume::unbounded();
        let armed = manager
            .arm_workflow(&engine, workflow, move |handle| {
                let _ = tx.send(handle);
            })
            .unwrap();
        assert_eq!(armed.triggers(), ["t".to_string()]);

        manual.fire(json!({"kind": "refund", "id": 1}));
        manual.fire(json!({"kind": "order", "id": 2}));

        let handle = tokio::time::timeout(Duration::from_secs(1), rx.recv_async()).await.unwrap().unwrap();
        let result = handle.wait().await.unwrap();
        assert_eq!(result.status, RunStatus::Succeeded);
        assert_eq!(result.visited_ids(), vec!["t", "a"]);
        assert_eq!(result.find("a").and_then(|r| r.value.clone()), Some(json!({"order": 2})));
        assert!(rx.try_recv().is_err());

        armed.disarm();
        manual.fire(json!({"kind": "order", "id": 3}));
        assert!(rx.try_recv().is_err());
    }
}
