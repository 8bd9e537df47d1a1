//! Trigger arming.
//!
//! A [`TriggerSource`] owns the mechanism behind a trigger type and calls back
//! whenever its event occurs. The [`TriggerManager`] routes trigger types to
//! sources and turns firings into subscriptions or engine runs.

mod interval;
mod manager;
mod manual;

pub use interval::IntervalTrigger;
pub use manager::{Activation, ArmedWorkflow, FireFn, Subscription, TriggerManager, TriggerSource};
pub use manual::ManualTrigger;
