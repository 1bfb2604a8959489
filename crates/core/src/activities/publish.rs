//! Publish activity: uploads one file under its target name.

use tracing::info;

use super::types::{FileTask, UploadResult};
use super::{Activities, PublishError};
use crate::bus::log_subject;
use crate::engine::ActivityContext;
use crate::metrics;
use crate::store::{detect_file_content_type, PutObjectRequest};

impl Activities {
    /// Uploads `task.source_file` to the bucket keyed by its target name.
    ///
    /// Notices go to the parent run's log subject so that one subscription
    /// follows the whole download.
    pub async fn upload_file(
        &self,
        ctx: &ActivityContext,
        task: &FileTask,
        parent_id: &str,
    ) -> Result<UploadResult, PublishError> {
        let name = task
            .target_name
            .as_deref()
            .ok_or_else(|| PublishError::MissingTargetName {
                source_file: task.source_file.clone(),
            })?;

        let content_type = detect_file_content_type(&task.source_file)
            .await
            .map_err(|e| PublishError::Detect {
                path: task.source_file.clone(),
                error: e,
            })?;

        let subject = log_subject(parent_id);
        self.bus
            .publish(&subject, format!("Uploading: {}", name).into_bytes())
            .await?;

        let locator = self
            .store
            .put_object(PutObjectRequest {
                bucket: self.bucket.clone(),
                key: name.to_string(),
                file_path: task.source_file.clone(),
                content_type: content_type.to_string(),
            })
            .await?;
        metrics::BYTES_UPLOADED.inc_by(locator.size);

        self.bus
            .publish(&subject, format!("Uploaded: {}", name).into_bytes())
            .await?;

        info!(
            workflow_id = %ctx.workflow_id(),
            parent = %parent_id,
            key = %locator.key,
            content_type,
            size = locator.size,
            store = self.store.name(),
            "Uploaded programme file"
        );

        Ok(UploadResult {
            programme_id: task.programme_id.clone(),
            workflow_id: ctx.workflow_id().to_string(),
            locator,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activities::PUBLISH_ACTIVITY;
    use crate::bus::BusError;
    use crate::config::DownloaderConfig;
    use crate::store::{FsObjectStore, ObjectStore, StoreError};
    use crate::testing::{MockCatalogue, MockMessageBus, MockObjectStore, RecordingHeartbeater};
    use std::path::Path;
    use std::sync::Arc;

    fn task_for(file: &Path, name: Option<&str>) -> FileTask {
        FileTask {
            programme_id: "m0008bbc".to_string(),
            save_path: file.parent().unwrap().to_path_buf(),
            source_file: file.to_path_buf(),
            target_name: name.map(str::to_string),
        }
    }

    fn ctx() -> ActivityContext {
        ActivityContext::new(
            "run-1_parse_0",
            PUBLISH_ACTIVITY,
            1,
            Arc::new(RecordingHeartbeater::new()),
        )
    }

    fn activities(bus: Arc<MockMessageBus>, store: Arc<dyn ObjectStore>) -> Activities {
        Activities::new(
            DownloaderConfig::new("/data"),
            bus,
            store,
            Arc::new(MockCatalogue::new()),
            "programmes",
        )
    }

    #[tokio::test]
    async fn test_upload_publishes_notices_and_stores() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("raw.mp3");
        tokio::fs::write(&file, b"ID3\x04\x00\x00\x00\x00\x00\x00audio").await.unwrap();

        let bus = Arc::new(MockMessageBus::new());
        let store = Arc::new(MockObjectStore::new());
        let acts = activities(bus.clone(), store.clone());

        let result = acts
            .upload_file(&ctx(), &task_for(&file, Some("Show - s01e01 - Pilot.mp3")), "run-1")
            .await
            .unwrap();

        assert_eq!(result.workflow_id, "run-1_parse_0");
        assert_eq!(result.locator.key, "Show - s01e01 - Pilot.mp3");
        assert_eq!(result.locator.content_type, "audio/mpeg");

        assert_eq!(
            bus.messages_on("log.run-1").await,
            vec![
                "Uploading: Show - s01e01 - Pilot.mp3".to_string(),
                "Uploaded: Show - s01e01 - Pilot.mp3".to_string(),
            ]
        );

        let puts = store.recorded_puts().await;
        assert_eq!(puts.len(), 1);
        assert_eq!(puts[0].bucket, "programmes");
        assert_eq!(puts[0].file_path, file);
    }

    #[tokio::test]
    async fn test_missing_target_name_is_permanent() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("raw.mp4");
        tokio::fs::write(&file, b"x").await.unwrap();
        let store = Arc::new(MockObjectStore::new());
        let acts = activities(Arc::new(MockMessageBus::new()), store.clone());

        let err = acts
            .upload_file(&ctx(), &task_for(&file, None), "run-1")
            .await
            .unwrap_err();

        assert!(matches!(err, PublishError::MissingTargetName { .. }));
        assert!(!err.is_retryable());
        assert!(store.recorded_puts().await.is_empty());
    }

    #[tokio::test]
    async fn test_notice_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("raw.mp4");
        tokio::fs::write(&file, b"x").await.unwrap();
        let bus = Arc::new(MockMessageBus::new());
        bus.set_next_error(BusError::Closed).await;
        let acts = activities(bus, Arc::new(MockObjectStore::new()));

        let err = acts
            .upload_file(&ctx(), &task_for(&file, Some("Show.mp4")), "run-1")
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::Notify(BusError::Closed)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_store_error_classification_passes_through() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("raw.mp4");
        tokio::fs::write(&file, b"x").await.unwrap();
        let store = Arc::new(MockObjectStore::new());
        store
            .set_next_error(StoreError::BucketNotFound("programmes".to_string()))
            .await;
        let acts = activities(Arc::new(MockMessageBus::new()), store);

        let err = acts
            .upload_file(&ctx(), &task_for(&file, Some("Show.mp4")), "run-1")
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::Store(StoreError::BucketNotFound(_))));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_republish_overwrites_same_key() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("raw.mp4");
        tokio::fs::write(&file, b"programme").await.unwrap();

        let store = FsObjectStore::new(dir.path().join("objects"));
        store.create_bucket("programmes").await.unwrap();
        let store = Arc::new(store);
        let acts = activities(Arc::new(MockMessageBus::new()), store.clone());
        let task = task_for(&file, Some("Show.mp4"));

        let first = acts.upload_file(&ctx(), &task, "run-1").await.unwrap();
        let second = acts.upload_file(&ctx(), &task, "run-1").await.unwrap();

        assert_eq!(first.locator, second.locator);
        let head = store.head_object("programmes", "Show.mp4").await.unwrap();
        assert_eq!(head, Some(second.locator));
    }
}
