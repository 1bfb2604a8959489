//! Execution context handed to workflows and activities.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use super::RetryPolicy;

/// Identity of a running workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowInfo {
    pub workflow_id: String,
    pub parent_workflow_id: Option<String>,
}

impl WorkflowInfo {
    /// Info for a top-level run.
    pub fn new(workflow_id: impl Into<String>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            parent_workflow_id: None,
        }
    }

    /// Info for a child started by this workflow.
    pub fn child(&self, workflow_id: impl Into<String>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            parent_workflow_id: Some(self.workflow_id.clone()),
        }
    }
}

/// Per-activity execution options.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityOptions {
    /// Ceiling for a single attempt.
    pub start_to_close_timeout: Duration,
    /// An attempt that goes this long without a heartbeat is failed.
    pub heartbeat_timeout: Option<Duration>,
    pub retry_policy: RetryPolicy,
}

impl ActivityOptions {
    pub fn new(start_to_close_timeout: Duration) -> Self {
        Self {
            start_to_close_timeout,
            heartbeat_timeout: None,
            retry_policy: RetryPolicy::default(),
        }
    }

    pub fn with_heartbeat_timeout(mut self, timeout: Duration) -> Self {
        self.heartbeat_timeout = Some(timeout);
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }
}

/// Options for starting a child workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildWorkflowOptions {
    pub workflow_id: String,
}

impl ChildWorkflowOptions {
    pub fn new(workflow_id: impl Into<String>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
        }
    }
}

/// Errors that can occur when recording a heartbeat.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HeartbeatError {
    /// The engine no longer tracks this attempt.
    #[error("Heartbeat channel closed for activity {activity}")]
    ChannelClosed { activity: String },

    /// The engine refused the heartbeat.
    #[error("Heartbeat rejected: {0}")]
    Rejected(String),
}

/// Reports activity liveness to the engine.
pub trait Heartbeater: Send + Sync {
    fn record_heartbeat(&self) -> Result<(), HeartbeatError>;
}

/// Context for one activity attempt.
#[derive(Clone)]
pub struct ActivityContext {
    workflow_id: String,
    activity: &'static str,
    attempt: u32,
    heartbeater: Arc<dyn Heartbeater>,
}

impl ActivityContext {
    pub fn new(
        workflow_id: impl Into<String>,
        activity: &'static str,
        attempt: u32,
        heartbeater: Arc<dyn Heartbeater>,
    ) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            activity,
            attempt,
            heartbeater,
        }
    }

    /// Id of the workflow that scheduled this activity.
    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    pub fn activity(&self) -> &'static str {
        self.activity
    }

    /// 1-based attempt number.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn heartbeater(&self) -> Arc<dyn Heartbeater> {
        Arc::clone(&self.heartbeater)
    }

    pub fn record_heartbeat(&self) -> Result<(), HeartbeatError> {
        self.heartbeater.record_heartbeat()
    }
}

impl fmt::Debug for ActivityContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivityContext")
            .field("workflow_id", &self.workflow_id)
            .field("activity", &self.activity)
            .field("attempt", &self.attempt)
            .finish_non_exhaustive()
    }
}
