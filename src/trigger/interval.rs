use std::{sync::Arc, time::Duration};

use serde::Deserialize;
use serde_json::Value;
use tokio::{runtime::Handle, time::MissedTickBehavior};
use tracing::debug;

use crate::{
    AutoflowError, Result,
    common::Shutdown,
    trigger::{FireFn, TriggerSource},
};

#[derive(Debug, Deserialize)]
struct IntervalConfig {
    every_ms: u64,
    #[serde(default)]
    payload: Value,
}

/// Trigger that fires every `every_ms` milliseconds with a fixed `payload`.
///
/// The first firing happens one period after arming.
pub struct IntervalTrigger {
    runtime: Handle,
}

impl IntervalTrigger {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
        }
    }
}

impl TriggerSource for IntervalTrigger {
    fn trigger_type(&self) -> &str {
        "interval"
    }

    fn arm(
        &self,
        config: &Value,
        on_fire: FireFn,
        shutdown: Arc<Shutdown>,
    ) -> Result<()> {
        let config: IntervalConfig = serde_json::from_value(config.clone()).map_err(|e| AutoflowError::Trigger(format!("invalid interval config: {}", e)))?;
        if config.every_ms == 0 {
            return Err(AutoflowError::Trigger("interval every_ms must be positive".to_string()));
        }

        let period = Duration::from_millis(config.every_ms);
        self.runtime.spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let stopped = shutdown.wait();
            tokio::pin!(stopped);

            loop {
                tokio::select! {
                    _ = &mut stopped => break,
                    _ = ticker.tick() => on_fire(config.payload.clone()),
                }
            }
            debug!(every_ms = config.every_ms, "interval trigger disarmed");
        });

        Ok(())
    }
}
