//! Per-file child workflow: resolve the name, then upload.

use std::sync::Arc;

use tracing::{debug, info};

use super::types::{ParsePhase, PhaseObserver};
use crate::activities::{
    Activities, FileTask, UploadResult, METADATA_ACTIVITY, PUBLISH_ACTIVITY,
};
use crate::catalogue::MediaType;
use crate::config::WorkflowConfig;
use crate::engine::{ActivityFailure, TaskScheduler, WorkflowError, WorkflowInfo};
use crate::metrics;

/// Handles one fetched file.
pub struct ParseWorkflow<S> {
    scheduler: S,
    activities: Arc<Activities>,
    config: WorkflowConfig,
    observer: Option<PhaseObserver<ParsePhase>>,
}

impl<S: Clone> Clone for ParseWorkflow<S> {
    fn clone(&self) -> Self {
        Self {
            scheduler: self.scheduler.clone(),
            activities: Arc::clone(&self.activities),
            config: self.config.clone(),
            observer: self.observer.clone(),
        }
    }
}

impl<S: TaskScheduler> ParseWorkflow<S> {
    pub fn new(scheduler: S, activities: Arc<Activities>, config: WorkflowConfig) -> Self {
        Self {
            scheduler,
            activities,
            config,
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: PhaseObserver<ParsePhase>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Runs metadata then publish for `task`.
    pub async fn run(
        &self,
        info: WorkflowInfo,
        task: FileTask,
        parent_id: String,
    ) -> Result<UploadResult, WorkflowError> {
        let outcome = self.execute(&info, task, &parent_id).await;
        let (phase, label) = match &outcome {
            Ok(_) => (ParsePhase::Done, "success"),
            Err(_) => (ParsePhase::Failed, "failure"),
        };
        self.report(&info, phase);
        metrics::WORKFLOW_RUNS
            .with_label_values(&["parse", label])
            .inc();
        outcome
    }

    async fn execute(
        &self,
        info: &WorkflowInfo,
        task: FileTask,
        parent_id: &str,
    ) -> Result<UploadResult, WorkflowError> {
        let options = self.config.activity_options();

        self.report(info, ParsePhase::NamingPending);
        let named = self
            .scheduler
            .execute_activity(info, METADATA_ACTIVITY, &options, |ctx| {
                let activities = Arc::clone(&self.activities);
                let task = task.clone();
                let parent_id = parent_id.to_string();
                async move {
                    activities
                        .generate_programme_name(&ctx, &task, &parent_id)
                        .await
                        .map_err(ActivityFailure::from)
                }
            })
            .await?;

        let task = task.with_target_name(named.name);

        self.report(info, ParsePhase::Publishing);
        let upload = self
            .scheduler
            .execute_activity(info, PUBLISH_ACTIVITY, &options, |ctx| {
                let activities = Arc::clone(&self.activities);
                let task = task.clone();
                let parent_id = parent_id.to_string();
                async move {
                    activities
                        .upload_file(&ctx, &task, &parent_id)
                        .await
                        .map_err(ActivityFailure::from)
                }
            })
            .await?;

        if named.metadata.media_type == MediaType::Audio {
            self.post_process_audio(info, &upload);
        }

        Ok(upload)
    }

    /// Extension point for audio-only follow-up work. Nothing is configured
    /// for it yet.
    fn post_process_audio(&self, info: &WorkflowInfo, upload: &UploadResult) {
        debug!(
            workflow_id = %info.workflow_id,
            key = %upload.locator.key,
            "Audio post-processing not configured, skipping"
        );
    }

    fn report(&self, info: &WorkflowInfo, phase: ParsePhase) {
        info!(workflow_id = %info.workflow_id, phase = %phase, "Parse workflow phase");
        if let Some(observer) = &self.observer {
            observer(&info.workflow_id, phase);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DownloaderConfig;
    use crate::engine::LocalScheduler;
    use crate::testing::{fixtures, MockCatalogue, MockMessageBus, MockObjectStore};
    use std::path::Path;
    use std::sync::Mutex;

    fn workflow(
        catalogue: MockCatalogue,
        store: Arc<MockObjectStore>,
        bus: Arc<MockMessageBus>,
    ) -> ParseWorkflow<LocalScheduler> {
        let activities = Activities::new(
            DownloaderConfig::new("/data"),
            bus,
            store,
            Arc::new(catalogue),
            "programmes",
        );
        let config = fixtures::test_config(Path::new("/tmp")).workflow;
        ParseWorkflow::new(LocalScheduler::new(), Arc::new(activities), config)
    }

    fn task(file: &Path) -> FileTask {
        FileTask {
            programme_id: "m0008bbc".to_string(),
            save_path: file.parent().unwrap().to_path_buf(),
            source_file: file.to_path_buf(),
            target_name: None,
        }
    }

    #[tokio::test]
    async fn test_names_then_uploads() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("raw.mp4");
        tokio::fs::write(&file, b"video").await.unwrap();

        let store = Arc::new(MockObjectStore::new());
        let bus = Arc::new(MockMessageBus::new());
        let phases = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&phases);

        let wf = workflow(
            MockCatalogue::with_programme(
                "m0008bbc",
                fixtures::programme_metadata("Doctor Who", "Space Babies", 14, 1),
            ),
            store.clone(),
            bus.clone(),
        )
        .with_observer(Arc::new(move |_id: &str, phase: ParsePhase| {
            seen.lock().unwrap().push(phase);
        }));

        let upload = wf
            .run(WorkflowInfo::new("run-1_parse_0"), task(&file), "run-1".to_string())
            .await
            .unwrap();

        assert_eq!(upload.locator.key, "Doctor Who - s14e01 - Space Babies.mp4");
        assert_eq!(upload.workflow_id, "run-1_parse_0");
        assert_eq!(
            store.keys("programmes").await,
            vec!["Doctor Who - s14e01 - Space Babies.mp4".to_string()]
        );
        assert_eq!(bus.messages_on("log.run-1").await.len(), 2);
        assert_eq!(
            *phases.lock().unwrap(),
            vec![
                ParsePhase::NamingPending,
                ParsePhase::Publishing,
                ParsePhase::Done
            ]
        );
    }

    #[tokio::test]
    async fn test_unknown_programme_skips_upload() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("raw.mp4");
        tokio::fs::write(&file, b"video").await.unwrap();
        let store = Arc::new(MockObjectStore::new());

        let err = workflow(
            MockCatalogue::new(),
            store.clone(),
            Arc::new(MockMessageBus::new()),
        )
        .run(WorkflowInfo::new("run-1_parse_0"), task(&file), "run-1".to_string())
        .await
        .unwrap_err();

        match err {
            WorkflowError::ActivityFailed {
                activity, attempts, ..
            } => {
                assert_eq!(activity, METADATA_ACTIVITY);
                assert_eq!(attempts, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(store.recorded_puts().await.is_empty());
    }

    #[tokio::test]
    async fn test_audio_programme_completes() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("raw.m4a");
        tokio::fs::write(&file, b"audio").await.unwrap();

        let mut metadata = fixtures::programme_metadata("In Our Time", "Tides", 1, 3);
        metadata.media_type = MediaType::Audio;

        let upload = workflow(
            MockCatalogue::with_programme("m0008bbc", metadata),
            Arc::new(MockObjectStore::new()),
            Arc::new(MockMessageBus::new()),
        )
        .run(WorkflowInfo::new("run-2_parse_0"), task(&file), "run-2".to_string())
        .await
        .unwrap();
        assert_eq!(upload.locator.key, "In Our Time - s01e03 - Tides.m4a");
    }
}
