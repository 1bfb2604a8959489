//! Top-level workflow: fetch a programme, then fan out one child per file.

use std::sync::Arc;

use tracing::{error, info};

use super::children::ChildSet;
use super::parse::ParseWorkflow;
use super::types::{child_workflow_id, AggregateResult, DownloadPhase, PhaseObserver};
use crate::activities::{Activities, DownloadRequest, FETCH_ACTIVITY};
use crate::config::WorkflowConfig;
use crate::engine::{
    ActivityFailure, ChildWorkflowOptions, TaskScheduler, WorkflowError, WorkflowHandle,
    WorkflowInfo,
};
use crate::metrics;

/// Downloads every file of a programme and publishes each one.
pub struct DownloadWorkflow<S> {
    scheduler: S,
    activities: Arc<Activities>,
    config: WorkflowConfig,
    observer: Option<PhaseObserver<DownloadPhase>>,
}

impl<S: Clone> Clone for DownloadWorkflow<S> {
    fn clone(&self) -> Self {
        Self {
            scheduler: self.scheduler.clone(),
            activities: Arc::clone(&self.activities),
            config: self.config.clone(),
            observer: self.observer.clone(),
        }
    }
}

impl<S: TaskScheduler> DownloadWorkflow<S> {
    pub fn new(scheduler: S, activities: Arc<Activities>, config: WorkflowConfig) -> Self {
        Self {
            scheduler,
            activities,
            config,
            observer: None,
        }
    }

    /// Reports every phase change of the top-level run to `observer`.
    pub fn with_observer(mut self, observer: PhaseObserver<DownloadPhase>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Starts a run in the background under `workflow_id`.
    pub fn start(
        &self,
        workflow_id: impl Into<String>,
        request: DownloadRequest,
    ) -> Result<WorkflowHandle<AggregateResult>, WorkflowError> {
        let workflow = self.clone();
        self.scheduler
            .start_workflow(WorkflowInfo::new(workflow_id), move |info| async move {
                workflow.run(info, request).await
            })
    }

    /// Runs the workflow to completion in the current task.
    pub async fn run(
        &self,
        info: WorkflowInfo,
        request: DownloadRequest,
    ) -> Result<AggregateResult, WorkflowError> {
        let outcome = self.execute(&info, &request).await;
        match &outcome {
            Ok(result) => {
                info!(
                    workflow_id = %info.workflow_id,
                    pid = %request.programme_id,
                    uploads = result.uploads.len(),
                    "Download workflow succeeded"
                );
                self.report(&info, DownloadPhase::Succeeded);
                metrics::WORKFLOW_RUNS
                    .with_label_values(&["download", "success"])
                    .inc();
            }
            Err(e) => {
                error!(
                    workflow_id = %info.workflow_id,
                    pid = %request.programme_id,
                    error = %e,
                    "Download workflow failed"
                );
                self.report(&info, DownloadPhase::Failed);
                metrics::WORKFLOW_RUNS
                    .with_label_values(&["download", "failure"])
                    .inc();
            }
        }
        outcome
    }

    async fn execute(
        &self,
        info: &WorkflowInfo,
        request: &DownloadRequest,
    ) -> Result<AggregateResult, WorkflowError> {
        self.report(info, DownloadPhase::Fetching);
        let fetched = self
            .scheduler
            .execute_activity(info, FETCH_ACTIVITY, &self.config.fetch_options(), |ctx| {
                let activities = Arc::clone(&self.activities);
                let request = request.clone();
                async move {
                    activities
                        .download_by_pid(&ctx, &request)
                        .await
                        .map_err(ActivityFailure::from)
                }
            })
            .await?;

        self.report(info, DownloadPhase::FanningOut);
        let parse = ParseWorkflow::new(
            self.scheduler.clone(),
            Arc::clone(&self.activities),
            self.config.clone(),
        );
        let mut children = ChildSet::new();
        for (index, task) in fetched.file_tasks().into_iter().enumerate() {
            let child_id = child_workflow_id(&info.workflow_id, index);
            let parse = parse.clone();
            let parent_id = info.workflow_id.clone();
            let handle = self.scheduler.start_child(
                info,
                ChildWorkflowOptions::new(child_id.clone()),
                move |child| async move { parse.run(child, task, parent_id).await },
            )?;
            children.push(child_id, handle);
        }
        info!(
            workflow_id = %info.workflow_id,
            children = children.len(),
            "Started parse workflows"
        );

        self.report(info, DownloadPhase::Aggregating);
        let uploads = children.join_all().await?;

        Ok(AggregateResult {
            programme_id: request.programme_id.clone(),
            workflow_id: info.workflow_id.clone(),
            uploads,
        })
    }

    fn report(&self, info: &WorkflowInfo, phase: DownloadPhase) {
        info!(workflow_id = %info.workflow_id, phase = %phase, "Download workflow phase");
        if let Some(observer) = &self.observer {
            observer(&info.workflow_id, phase);
        }
    }
}
