//! Task scheduler: per-key mutual exclusion, bounded workers, retries with
//! backoff and delayed follow-up tasks.
//!
//! All state lives in a [`TaskScheduler`] built by [`TaskScheduler::start`];
//! nothing is global.

mod handler;
mod retry;
mod task;
mod task_scheduler;

pub use handler::{RegistryTaskHandler, TaskHandler};
pub use retry::RetryPolicy;
pub use task::{FollowUp, Task, TaskOutcome, TaskResult};
pub use task_scheduler::TaskScheduler;
