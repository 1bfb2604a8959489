//! Scheduler trait that workflows are written against.

use std::future::Future;

use async_trait::async_trait;
use tokio::task::{AbortHandle, JoinHandle};

use super::{ActivityContext, ActivityFailure, ActivityOptions, ChildWorkflowOptions};
use super::{WorkflowError, WorkflowInfo};

/// Runs activities with retries and starts workflows.
///
/// Workflows are generic over this trait so the same orchestration code can
/// be driven by the in-process [`LocalScheduler`](super::LocalScheduler) or
/// by a test double.
#[async_trait]
pub trait TaskScheduler: Clone + Send + Sync + 'static {
    /// Runs `activity` under `options`, retrying per its retry policy.
    ///
    /// `f` is invoked once per attempt with a fresh [`ActivityContext`].
    async fn execute_activity<T, F, Fut>(
        &self,
        workflow: &WorkflowInfo,
        activity: &'static str,
        options: &ActivityOptions,
        f: F,
    ) -> Result<T, WorkflowError>
    where
        T: Send + 'static,
        F: Fn(ActivityContext) -> Fut + Send + Sync,
        Fut: Future<Output = Result<T, ActivityFailure>> + Send;

    /// Starts a top-level workflow.
    fn start_workflow<T, F, Fut>(
        &self,
        info: WorkflowInfo,
        f: F,
    ) -> Result<WorkflowHandle<T>, WorkflowError>
    where
        T: Send + 'static,
        F: FnOnce(WorkflowInfo) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, WorkflowError>> + Send + 'static;

    /// Starts a child workflow of `parent`.
    fn start_child<T, F, Fut>(
        &self,
        parent: &WorkflowInfo,
        options: ChildWorkflowOptions,
        f: F,
    ) -> Result<WorkflowHandle<T>, WorkflowError>
    where
        T: Send + 'static,
        F: FnOnce(WorkflowInfo) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, WorkflowError>> + Send + 'static,
    {
        self.start_workflow(parent.child(options.workflow_id), f)
    }
}

/// Handle to a started workflow.
#[derive(Debug)]
pub struct WorkflowHandle<T> {
    workflow_id: String,
    task: JoinHandle<Result<T, WorkflowError>>,
}

impl<T> WorkflowHandle<T> {
    pub fn new(workflow_id: String, task: JoinHandle<Result<T, WorkflowError>>) -> Self {
        Self { workflow_id, task }
    }

    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    /// Requests cancellation; the result resolves to `ChildCancelled`.
    pub fn cancel(&self) {
        self.task.abort();
    }

    /// A detached handle that can cancel the workflow later.
    pub fn abort_handle(&self) -> AbortHandle {
        self.task.abort_handle()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the workflow to finish.
    pub async fn result(self) -> Result<T, WorkflowError> {
        match self.task.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(WorkflowError::ChildCancelled {
                workflow_id: self.workflow_id,
            }),
            Err(_) => Err(WorkflowError::ChildPanicked {
                workflow_id: self.workflow_id,
            }),
        }
    }
}
