//! Engine error types.

use thiserror::Error;

/// Failure reported by one activity attempt.
///
/// The engine retries only failures marked retryable.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ActivityFailure {
    message: String,
    retryable: bool,
}

impl ActivityFailure {
    pub fn retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
        }
    }

    pub fn non_retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_retryable(&self) -> bool {
        self.retryable
    }
}

/// Errors surfaced by workflows.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// An activity failed permanently or ran out of attempts.
    #[error("Activity {activity} failed after {attempts} attempt(s): {cause}")]
    ActivityFailed {
        activity: String,
        attempts: u32,
        #[source]
        cause: ActivityFailure,
    },

    /// A child workflow failed.
    #[error("Child workflow {workflow_id} failed: {cause}")]
    ChildFailed {
        workflow_id: String,
        #[source]
        cause: Box<WorkflowError>,
    },

    #[error("Workflow {workflow_id} was cancelled")]
    ChildCancelled { workflow_id: String },

    #[error("Workflow {workflow_id} panicked")]
    ChildPanicked { workflow_id: String },

    /// A workflow with the same id is still running.
    #[error("Workflow {0} is already running")]
    AlreadyStarted(String),
}

impl WorkflowError {
    /// Id of the failed child, if this error came from one.
    pub fn failed_child(&self) -> Option<&str> {
        match self {
            Self::ChildFailed { workflow_id, .. } => Some(workflow_id),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::ChildCancelled { .. })
    }
}
