mod channel;
mod context;
mod result;
mod run;

pub use channel::{Channel, ChannelEvent, ChannelOptions};
pub use context::Context;
pub use result::{NodeExecutionStatus, NodeRecord, RunResult, RunStatus};
pub use run::{RunHandle, RunId};
