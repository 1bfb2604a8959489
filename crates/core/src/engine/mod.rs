//! Durable-execution engine abstraction.
//!
//! Workflows describe orchestration (which activities run, which children
//! are started) and are written against [`TaskScheduler`]. The scheduler
//! owns retries, attempt timeouts and heartbeat supervision. Activities do
//! the side-effecting work and never retry internally.

mod context;
mod error;
mod local;
mod retry;
mod scheduler;

pub use context::{
    ActivityContext, ActivityOptions, ChildWorkflowOptions, HeartbeatError, Heartbeater,
    WorkflowInfo,
};
pub use error::{ActivityFailure, WorkflowError};
pub use local::LocalScheduler;
pub use retry::RetryPolicy;
pub use scheduler::{TaskScheduler, WorkflowHandle};
