use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::{AutoflowError, Result, common::Shutdown, runtime::RunResult};

pub type RunId = String;

/// Handle to a run started with [`Engine::start`](crate::Engine::start).
///
/// Dropping the handle does not cancel the run.
pub struct RunHandle {
    id: RunId,
    shutdown: Arc<Shutdown>,
    join: JoinHandle<RunResult>,
}

impl RunHandle {
    pub(crate) fn new(
        id: RunId,
        shutdown: Arc<Shutdown>,
        join: JoinHandle<RunResult>,
    ) -> Self {
        Self {
            id,
            shutdown,
            join,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Stop the run: suspended nodes finish as cancelled and no further
    /// children are started.
    pub fn cancel(&self) {
        self.shutdown.shutdown();
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the run to finish and return its result tree.
    pub async fn wait(self) -> Result<RunResult> {
        self.join.await.map_err(|e| AutoflowError::Runtime(format!("run {} aborted: {}", self.id, e)))
    }
}
