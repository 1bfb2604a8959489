//! In-process scheduler backed by tokio tasks.

use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{
    ActivityContext, ActivityFailure, ActivityOptions, HeartbeatError, Heartbeater,
    TaskScheduler, WorkflowError, WorkflowHandle, WorkflowInfo,
};
use crate::metrics;

/// Runs activities inline in the calling workflow and workflows as tasks.
///
/// Cloning is cheap; clones share the set of running workflow ids.
#[derive(Debug, Clone, Default)]
pub struct LocalScheduler {
    running: Arc<Mutex<HashSet<String>>>,
}

impl LocalScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a workflow with `workflow_id` is currently running.
    pub fn is_running(&self, workflow_id: &str) -> bool {
        self.lock_running().contains(workflow_id)
    }

    pub fn running_count(&self) -> usize {
        self.lock_running().len()
    }

    fn lock_running(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        // The set stays consistent even if a holder panicked
        self.running
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn claim(&self, workflow_id: &str) -> Result<RunningGuard, WorkflowError> {
        let mut running = self.lock_running();
        if !running.insert(workflow_id.to_string()) {
            return Err(WorkflowError::AlreadyStarted(workflow_id.to_string()));
        }
        Ok(RunningGuard {
            running: Arc::clone(&self.running),
            workflow_id: workflow_id.to_string(),
        })
    }

    async fn run_attempt<T, Fut>(
        fut: Fut,
        options: &ActivityOptions,
        heartbeats: watch::Receiver<Instant>,
    ) -> Result<T, ActivityFailure>
    where
        Fut: Future<Output = Result<T, ActivityFailure>>,
    {
        let timeout = options.start_to_close_timeout;
        tokio::select! {
            res = tokio::time::timeout(timeout, fut) => match res {
                Ok(outcome) => outcome,
                Err(_) => Err(ActivityFailure::retryable(format!(
                    "start-to-close timeout of {}s exceeded",
                    timeout.as_secs()
                ))),
            },
            _ = heartbeat_watchdog(heartbeats, options.heartbeat_timeout) => {
                Err(ActivityFailure::retryable("heartbeat timeout exceeded"))
            }
        }
    }
}

/// Removes a workflow id from the running set when the run ends or is
/// cancelled.
struct RunningGuard {
    running: Arc<Mutex<HashSet<String>>>,
    workflow_id: String,
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        let mut running = self
            .running
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        running.remove(&self.workflow_id);
    }
}

/// Heartbeater feeding the watchdog of one attempt.
struct ChannelHeartbeater {
    activity: &'static str,
    tx: watch::Sender<Instant>,
}

impl Heartbeater for ChannelHeartbeater {
    fn record_heartbeat(&self) -> Result<(), HeartbeatError> {
        self.tx
            .send(Instant::now())
            .map_err(|_| HeartbeatError::ChannelClosed {
                activity: self.activity.to_string(),
            })
    }
}

/// Completes once no heartbeat has arrived for `timeout`.
async fn heartbeat_watchdog(mut rx: watch::Receiver<Instant>, timeout: Option<Duration>) {
    let Some(timeout) = timeout else {
        return std::future::pending().await;
    };

    loop {
        let deadline = *rx.borrow_and_update() + timeout;
        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => return,
            changed = rx.changed() => {
                if changed.is_err() {
                    // No further heartbeats can arrive
                    tokio::time::sleep_until(deadline).await;
                    return;
                }
            }
        }
    }
}

#[async_trait]
impl TaskScheduler for LocalScheduler {
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
        Fut: Future<Output = Result<T, ActivityFailure>> + Send,
    {
        let policy = &options.retry_policy;
        let mut attempt = 1u32;

        loop {
            let (tx, rx) = watch::channel(Instant::now());
            let ctx = ActivityContext::new(
                workflow.workflow_id.clone(),
                activity,
                attempt,
                Arc::new(ChannelHeartbeater { activity, tx }),
            );

            debug!(
                workflow_id = %workflow.workflow_id,
                activity,
                attempt,
                "Starting activity attempt"
            );
            let timer = metrics::ACTIVITY_DURATION
                .with_label_values(&[activity])
                .start_timer();
            let outcome = Self::run_attempt(f(ctx), options, rx).await;
            timer.observe_duration();

            let failure = match outcome {
                Ok(value) => {
                    metrics::ACTIVITY_ATTEMPTS
                        .with_label_values(&[activity, "success"])
                        .inc();
                    return Ok(value);
                }
                Err(failure) => failure,
            };

            let result_label = if failure.is_retryable() {
                "retryable"
            } else {
                "permanent"
            };
            metrics::ACTIVITY_ATTEMPTS
                .with_label_values(&[activity, result_label])
                .inc();

            if !failure.is_retryable() || !policy.allows_another_attempt(attempt) {
                warn!(
                    workflow_id = %workflow.workflow_id,
                    activity,
                    attempt,
                    retryable = failure.is_retryable(),
                    error = %failure,
                    "Activity failed"
                );
                return Err(WorkflowError::ActivityFailed {
                    activity: activity.to_string(),
                    attempts: attempt,
                    cause: failure,
                });
            }

            let delay = policy.delay_after(attempt);
            warn!(
                workflow_id = %workflow.workflow_id,
                activity,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %failure,
                "Activity attempt failed, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    fn start_workflow<T, F, Fut>(
        &self,
        info: WorkflowInfo,
        f: F,
    ) -> Result<WorkflowHandle<T>, WorkflowError>
    where
        T: Send + 'static,
        F: FnOnce(WorkflowInfo) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, WorkflowError>> + Send + 'static,
    {
        let guard = self.claim(&info.workflow_id)?;
        let workflow_id = info.workflow_id.clone();

        info!(
            workflow_id = %workflow_id,
            parent = info.parent_workflow_id.as_deref().unwrap_or("-"),
            "Starting workflow"
        );

        let task = tokio::spawn(async move {
            let _guard = guard;
            f(info).await
        });

        Ok(WorkflowHandle::new(workflow_id, task))
    }
}
