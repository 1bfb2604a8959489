//! Periodic heartbeats scoped to a blocking operation.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::engine::{HeartbeatError, Heartbeater};
use crate::metrics;

/// A running heartbeat ticker.
///
/// Started right before a long operation; [`stop`](Self::stop) consumes the
/// guard, so the ticker is stopped at most once. Dropping an unstopped guard
/// (e.g. when the surrounding future is cancelled) aborts the ticker.
pub struct HeartbeatGuard {
    stop_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<Result<u64, HeartbeatError>>>,
}

impl HeartbeatGuard {
    /// Starts ticking every `interval`; the first beat is one interval in.
    pub fn start(heartbeater: Arc<dyn Heartbeater>, interval: Duration) -> Self {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let interval = interval.max(Duration::from_millis(1));

        let task = tokio::spawn(async move {
            let first = tokio::time::Instant::now() + interval;
            let mut ticker = tokio::time::interval_at(first, interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            let mut beats = 0u64;
            loop {
                tokio::select! {
                    _ = &mut stop_rx => return Ok(beats),
                    _ = ticker.tick() => {
                        if let Err(e) = heartbeater.record_heartbeat() {
                            warn!(error = %e, beats, "Failed to record heartbeat");
                            return Err(e);
                        }
                        beats += 1;
                        metrics::HEARTBEATS_SENT.inc();
                        debug!(beats, "Heartbeat recorded");
                    }
                }
            }
        });

        Self {
            stop_tx: Some(stop_tx),
            task: Some(task),
        }
    }

    /// True until the guard is stopped or the ticker fails.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Completes only if the ticker ends by itself, i.e. a heartbeat failed.
    pub async fn wait_for_failure(&mut self) -> HeartbeatError {
        let Some(task) = self.task.as_mut() else {
            return std::future::pending().await;
        };
        let outcome = task.await;
        self.task = None;
        match outcome {
            Ok(Err(e)) => e,
            Ok(Ok(_)) => std::future::pending().await,
            Err(e) => HeartbeatError::Rejected(format!("heartbeat task ended: {}", e)),
        }
    }

    /// Stops the ticker and waits for it to exit.
    ///
    /// Returns the number of heartbeats recorded, or the failure that ended
    /// the ticker early.
    pub async fn stop(mut self) -> Result<u64, HeartbeatError> {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        match self.task.take() {
            Some(task) => task
                .await
                .map_err(|e| HeartbeatError::Rejected(format!("heartbeat task ended: {}", e)))?,
            None => Ok(0),
        }
    }
}

impl Drop for HeartbeatGuard {
    fn drop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Runs `fut` with heartbeats every `interval`.
///
/// The ticker is stopped on every exit path. If a heartbeat fails before
/// `fut` completes, `fut` is dropped and the heartbeat error is returned.
pub async fn with_heartbeat<T, Fut>(
    heartbeater: Arc<dyn Heartbeater>,
    interval: Duration,
    fut: Fut,
) -> Result<T, HeartbeatError>
where
    Fut: Future<Output = T>,
{
    let mut guard = HeartbeatGuard::start(heartbeater, interval);
    tokio::pin!(fut);

    let outcome = tokio::select! {
        value = &mut fut => Ok(value),
        err = guard.wait_for_failure() => Err(err),
    };

    match guard.stop().await {
        Ok(beats) => debug!(beats, "Heartbeat stopped"),
        Err(e) => debug!(error = %e, "Heartbeat stopped after failure"),
    }
    outcome
}
