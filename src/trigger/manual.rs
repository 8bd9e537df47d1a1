use std::sync::Arc;

use serde_json::Value;

use crate::{
    Result, ShareLock,
    common::Shutdown,
    trigger::{FireFn, TriggerSource},
};

/// Trigger fired by calling [`ManualTrigger::fire`].
///
/// Clones share their armed callbacks, so one clone can be registered with a
/// [`TriggerManager`](crate::TriggerManager) while another fires it.
#[derive(Clone, Default)]
pub struct ManualTrigger {
    armed: ShareLock<Vec<(Arc<Shutdown>, FireFn)>>,
}

impl ManualTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire every armed callback with `payload`. Returns how many were fired.
    pub fn fire(
        &self,
        payload: Value,
    ) -> usize {
        let targets: Vec<FireFn> = match self.armed.write() {
            Ok(mut armed) => {
                armed.retain(|(shutdown, _)| !shutdown.is_terminated());
                armed.iter().map(|(_, on_fire)| on_fire.clone()).collect()
            }
            Err(_) => return 0,
        };

        for on_fire in &targets {
            on_fire(payload.clone());
        }
        targets.len()
    }

    /// Number of callbacks still armed.
    pub fn armed(&self) -> usize {
        self.armed.read().map(|armed| armed.iter().filter(|(shutdown, _)| !shutdown.is_terminated()).count()).unwrap_or(0)
    }
}

impl TriggerSource for ManualTrigger {
    fn trigger_type(&self) -> &str {
        "manual"
    }

    fn arm(
        &self,
        _config: &Value,
        on_fire: FireFn,
        shutdown: Arc<Shutdown>,
    ) -> Result<()> {
        if let Ok(mut armed) = self.armed.write() {
            armed.push((shutdown, on_fire));
        }
        Ok(())
    }
}
