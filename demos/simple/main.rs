use std::sync::Arc;

use async_trait::async_trait;
use autoflow::{ActionHandler, ActionOutput, ActionRegistry, ChannelEvent, ChannelOptions, Context, EngineBuilder, Result, WorkflowModel};
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

struct SendEmail;

#[async_trait]
impl ActionHandler for SendEmail {
    fn action_type(&self) -> &str {
        "send-email"
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "to": { "type": "string" }, "subject": { "type": "string" } },
            "required": ["to"]
        })
    }

    async fn run(
        &self,
        config: Value,
        _ctx: Context,
    ) -> Result<ActionOutput> {
        println!("sending email to {}", config["to"]);
        Ok(ActionOutput::success(json!({"wasEmailSent": true})))
    }
}

struct CreateTask;

#[async_trait]
impl ActionHandler for CreateTask {
    fn action_type(&self) -> &str {
        "create-task"
    }

    async fn run(
        &self,
        config: Value,
        ctx: Context,
    ) -> Result<ActionOutput> {
        println!("creating task '{}' for run {}", config["title"], ctx.run_id());
        Ok(ActionOutput::success(json!({"taskId": 42, "task": config})))
    }
}

struct LogFailure;

#[async_trait]
impl ActionHandler for LogFailure {
    fn action_type(&self) -> &str {
        "log-failure"
    }

    async fn run(
        &self,
        config: Value,
        _ctx: Context,
    ) -> Result<ActionOutput> {
        println!("failure: {}", config["reason"]);
        Ok(ActionOutput::success(Value::Null))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let registry = ActionRegistry::with_builtins()?.with(SendEmail)?.with(CreateTask)?.with(LogFailure)?;
    let engine = EngineBuilder::new().dispatcher(Arc::new(registry)).build()?;

    ChannelEvent::channel(engine.channel(), ChannelOptions::default())?.on_error(move |e| {
        println!("error event: {:?}", e.event);
    });

    let text = include_str!("./workflow.json");
    let workflow_model = WorkflowModel::from_json(text)?;
    println!("{}", engine.validate(&workflow_model)?.schema());

    let result = engine
        .execute_workflow(&workflow_model, Some(json!({"from": "alice@example.com", "subject": "Invoice"})))
        .await?;

    println!("Status: {}", result.status);
    println!("Visited: {:?}", result.visited_ids());
    println!("Outputs: {:#?}", result.find("task").and_then(|r| r.value.clone()));

    Ok(())
}
