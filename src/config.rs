use std::{fs, path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{AutoflowError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// timeout of a single action dispatch or condition evaluation in milliseconds, defaults to 30000
    pub node_timeout_ms: u64,
    /// max action/condition calls in flight across all runs, 0 means unbounded
    pub max_concurrent_nodes: usize,
    /// capacity of the lifecycle event queue, defaults to 2048
    pub event_queue_size: usize,
    /// capacity of each trigger subscription queue, defaults to 1024
    pub subscription_queue_size: usize,
    /// number of async worker threads when the engine owns its runtime, range [1, 32768), defaults to 16
    pub async_worker_thread_number: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            node_timeout_ms: 30_000,
            max_concurrent_nodes: 0,
            event_queue_size: 2048,
            subscription_queue_size: 1024,
            async_worker_thread_number: 16,
        }
    }
}

impl Config {
    pub fn create<T: AsRef<Path>>(path: T) -> Result<Self> {
        let data = fs::read_to_string(path.as_ref()).map_err(|e| AutoflowError::Config(format!("failed to load config file {:?}: {}", path.as_ref(), e)))?;

        Self::load_from_str(data.as_str())
    }

    pub fn load_from_str(toml_str: &str) -> Result<Self> {
        let config = toml::from_str::<Config>(toml_str)?;
        Ok(config)
    }

    pub fn node_timeout(&self) -> Duration {
        Duration::from_millis(self.node_timeout_ms)
    }
}
