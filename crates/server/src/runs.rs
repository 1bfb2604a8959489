//! In-memory registry of download runs started through the API.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::debug;

use beeb_core::{config::WorkflowConfig, AggregateResult, DownloadPhase, WorkflowError};

/// Externally visible state of one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunStatus {
    pub workflow_id: String,
    pub programme_id: String,
    pub phase: DownloadPhase,
    pub cancelled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<AggregateResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

struct RunEntry {
    status: RunStatus,
    abort: Option<AbortHandle>,
    finished: watch::Sender<bool>,
}

/// Outcome of a cancel request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelOutcome {
    Cancelled,
    AlreadyFinished(DownloadPhase),
    NotFound,
}

/// Tracks runs by workflow id. Cheap to clone.
///
/// Finished runs are kept for `retention` and at most `max_finished` of
/// them at a time; live runs are never evicted.
#[derive(Clone)]
pub struct RunRegistry {
    runs: Arc<RwLock<HashMap<String, RunEntry>>>,
    retention: chrono::Duration,
    max_finished: usize,
}

impl Default for RunRegistry {
    fn default() -> Self {
        Self::from_config(&WorkflowConfig::default())
    }
}

impl RunRegistry {
    pub fn new(retention: Duration, max_finished: usize) -> Self {
        Self {
            runs: Arc::default(),
            retention: chrono::Duration::from_std(retention).unwrap_or_else(|_| chrono::Duration::days(36_500)),
            max_finished,
        }
    }

    pub fn from_config(config: &WorkflowConfig) -> Self {
        Self::new(
            Duration::from_secs(config.run_retention_secs),
            config.max_finished_runs,
        )
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, RunEntry>> {
        self.runs.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, RunEntry>> {
        self.runs.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_expired(&self, status: &RunStatus, now: DateTime<Utc>) -> bool {
        status.phase.is_terminal() && now - status.updated_at > self.retention
    }

    /// Registers a new run in the `fetching` phase.
    ///
    /// Returns false if a run with this id is already known.
    pub fn begin(&self, workflow_id: &str, programme_id: &str) -> bool {
        let now = Utc::now();
        let mut runs = self.write();
        self.evict(&mut runs, now);
        if runs.contains_key(workflow_id) {
            return false;
        }
        let (finished, _) = watch::channel(false);
        runs.insert(
            workflow_id.to_string(),
            RunEntry {
                status: RunStatus {
                    workflow_id: workflow_id.to_string(),
                    programme_id: programme_id.to_string(),
                    phase: DownloadPhase::Fetching,
                    cancelled: false,
                    created_at: now,
                    updated_at: now,
                    result: None,
                    error: None,
                },
                abort: None,
                finished,
            },
        );
        true
    }

    /// Forgets a run that never started.
    pub fn discard(&self, workflow_id: &str) {
        self.write().remove(workflow_id);
    }

    pub fn attach(&self, workflow_id: &str, abort: AbortHandle) {
        if let Some(entry) = self.write().get_mut(workflow_id) {
            entry.abort = Some(abort);
        }
    }

    /// Records a phase change reported by the workflow. Terminal phases are
    /// left to [`RunRegistry::finish`] so that a finished run always carries
    /// its result or error.
    pub fn set_phase(&self, workflow_id: &str, phase: DownloadPhase) {
        if phase.is_terminal() {
            return;
        }
        if let Some(entry) = self.write().get_mut(workflow_id) {
            if !entry.status.phase.is_terminal() {
                entry.status.phase = phase;
                entry.status.updated_at = Utc::now();
            }
        }
    }

    /// Records the final outcome of a run and releases its task handle.
    pub fn finish(&self, workflow_id: &str, outcome: Result<AggregateResult, WorkflowError>) {
        let now = Utc::now();
        let mut runs = self.write();
        if let Some(entry) = runs.get_mut(workflow_id) {
            let status = &mut entry.status;
            match outcome {
                Ok(result) => {
                    status.phase = DownloadPhase::Succeeded;
                    status.result = Some(result);
                }
                Err(e) => {
                    status.phase = DownloadPhase::Failed;
                    status.cancelled = e.is_cancelled();
                    status.error = Some(e.to_string());
                }
            }
            status.updated_at = now;
            entry.abort = None;
            entry.finished.send_replace(true);
        }
        self.evict(&mut runs, now);
    }

    /// Drops finished runs past the retention window, then the oldest
    /// finished runs beyond the cap. Returns how many were dropped.
    pub fn evict_finished(&self, now: DateTime<Utc>) -> usize {
        self.evict(&mut self.write(), now)
    }

    fn evict(&self, runs: &mut HashMap<String, RunEntry>, now: DateTime<Utc>) -> usize {
        let before = runs.len();
        runs.retain(|_, entry| !self.is_expired(&entry.status, now));

        let mut finished: Vec<(DateTime<Utc>, String)> = runs
            .values()
            .filter(|entry| entry.status.phase.is_terminal())
            .map(|entry| (entry.status.updated_at, entry.status.workflow_id.clone()))
            .collect();
        if finished.len() > self.max_finished {
            finished.sort();
            let excess = finished.len() - self.max_finished;
            for (_, id) in finished.into_iter().take(excess) {
                runs.remove(&id);
            }
        }

        let evicted = before - runs.len();
        if evicted > 0 {
            debug!(evicted, remaining = runs.len(), "Evicted finished runs");
        }
        evicted
    }

    /// Aborts a live run and waits until its outcome is recorded. Its
    /// children are cancelled with it.
    ///
    /// A run that completed on its own before the abort landed reports
    /// `AlreadyFinished` with its real phase.
    pub async fn cancel(&self, workflow_id: &str) -> CancelOutcome {
        let mut finished = {
            let runs = self.read();
            let Some(entry) = runs.get(workflow_id) else {
                return CancelOutcome::NotFound;
            };
            match &entry.abort {
                Some(abort) if !entry.status.phase.is_terminal() => {
                    abort.abort();
                    entry.finished.subscribe()
                }
                _ => return CancelOutcome::AlreadyFinished(entry.status.phase),
            }
        };

        if finished.wait_for(|done| *done).await.is_err() {
            return CancelOutcome::NotFound;
        }
        match self.get(workflow_id) {
            Some(status) if status.cancelled => CancelOutcome::Cancelled,
            Some(status) => CancelOutcome::AlreadyFinished(status.phase),
            None => CancelOutcome::NotFound,
        }
    }

    /// Resolves once the run's outcome has been recorded, or its record is
    /// dropped. Never resolves for an unknown run.
    pub fn wait_finished(&self, workflow_id: &str) -> impl Future<Output = ()> + Send + 'static {
        let finished = self
            .read()
            .get(workflow_id)
            .map(|entry| entry.finished.subscribe());
        async move {
            match finished {
                Some(mut finished) => {
                    let _ = finished.wait_for(|done| *done).await;
                }
                None => std::future::pending::<()>().await,
            }
        }
    }

    pub fn get(&self, workflow_id: &str) -> Option<RunStatus> {
        let now = Utc::now();
        self.read()
            .get(workflow_id)
            .filter(|e| !self.is_expired(&e.status, now))
            .map(|e| e.status.clone())
    }

    /// Number of runs kept in each phase.
    pub fn count_by_phase(&self) -> HashMap<DownloadPhase, usize> {
        let mut counts = HashMap::new();
        for entry in self.read().values() {
            *counts.entry(entry.status.phase).or_insert(0) += 1;
        }
        counts
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}
