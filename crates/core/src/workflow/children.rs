//! Bookkeeping for started child workflows.

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::task::AbortHandle;
use tracing::{debug, warn};

use crate::engine::{WorkflowError, WorkflowHandle};

/// Ordered set of running children.
///
/// Dropping the set aborts every child that has not finished, so cancelling
/// a parent cancels its children.
pub struct ChildSet<T> {
    abort_handles: Vec<AbortHandle>,
    children: Vec<(String, WorkflowHandle<T>)>,
}

impl<T> Default for ChildSet<T> {
    fn default() -> Self {
        Self {
            abort_handles: Vec::new(),
            children: Vec::new(),
        }
    }
}

impl<T: Send + 'static> ChildSet<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, workflow_id: String, handle: WorkflowHandle<T>) {
        self.abort_handles.push(handle.abort_handle());
        self.children.push((workflow_id, handle));
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.children.iter().map(|(id, _)| id.as_str()).collect()
    }

    /// Aborts every child; finished children are unaffected.
    pub fn abort_all(&self) {
        for handle in &self.abort_handles {
            handle.abort();
        }
    }

    /// Waits for every child, in completion order.
    ///
    /// On the first failure the remaining children are cancelled and awaited,
    /// and the failure is returned naming the failed child. On success the
    /// results are returned in insertion order.
    pub async fn join_all(mut self) -> Result<Vec<T>, WorkflowError> {
        let mut pending: FuturesUnordered<_> = std::mem::take(&mut self.children)
            .into_iter()
            .enumerate()
            .map(|(index, (workflow_id, handle))| async move {
                (index, workflow_id, handle.result().await)
            })
            .collect();

        let mut results = Vec::with_capacity(pending.len());
        while let Some((index, workflow_id, outcome)) = pending.next().await {
            match outcome {
                Ok(value) => {
                    debug!(child = %workflow_id, "Child workflow completed");
                    results.push((index, value));
                }
                Err(cause) => {
                    warn!(
                        child = %workflow_id,
                        error = %cause,
                        remaining = pending.len(),
                        "Child workflow failed, cancelling siblings"
                    );
                    self.abort_all();
                    while pending.next().await.is_some() {}
                    return Err(WorkflowError::ChildFailed {
                        workflow_id,
                        cause: Box::new(cause),
                    });
                }
            }
        }

        results.sort_by_key(|(index, _)| *index);
        Ok(results.into_iter().map(|(_, value)| value).collect())
    }
}

impl<T> Drop for ChildSet<T> {
    fn drop(&mut self) {
        for handle in &self.abort_handles {
            handle.abort();
        }
    }
}
