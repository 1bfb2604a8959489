//! Fetch activity: runs the external download utility for one PID.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::types::{DownloadRequest, FetchResult};
use super::{Activities, FetchError};
use crate::engine::ActivityContext;
use crate::progress::{with_heartbeat, ProgressSink};

/// Command line for one download: fixed flags, then configured extras.
pub fn downloader_args(programme_id: &str, save_path: &Path, extra_args: &[String]) -> Vec<String> {
    let mut args = vec![
        "--nocopyright".to_string(),
        "--subdir".to_string(),
        "--whitespace".to_string(),
        "--pid-recursive".to_string(),
        "--force".to_string(),
        format!("--pid={}", programme_id),
        format!("--output={}", save_path.display()),
    ];
    args.extend(extra_args.iter().cloned());
    args
}

impl Activities {
    /// Downloads every file of a programme into `<output_dir>/<workflow_id>`.
    ///
    /// Utility output is relayed to `log.<workflow_id>` as it is produced and
    /// heartbeats are recorded while the utility runs.
    pub async fn download_by_pid(
        &self,
        ctx: &ActivityContext,
        request: &DownloadRequest,
    ) -> Result<FetchResult, FetchError> {
        let save_path = self.downloader.output_dir.join(ctx.workflow_id());
        let sink = ProgressSink::new(self.bus.clone(), ctx.workflow_id());

        info!(
            workflow_id = %ctx.workflow_id(),
            pid = %request.programme_id,
            attempt = ctx.attempt(),
            save_path = %save_path.display(),
            "Downloading programme"
        );

        let run = self.run_downloader(&request.programme_id, &save_path, &sink);
        with_heartbeat(ctx.heartbeater(), self.downloader.heartbeat_interval(), run).await??;

        sink.write_str("Programme downloaded").await?;

        let files = list_files(save_path.clone()).await?;
        info!(
            workflow_id = %ctx.workflow_id(),
            pid = %request.programme_id,
            files = files.len(),
            "Programme downloaded"
        );

        Ok(FetchResult {
            programme_id: request.programme_id.clone(),
            save_path,
            files,
        })
    }

    async fn run_downloader(
        &self,
        programme_id: &str,
        save_path: &Path,
        sink: &ProgressSink,
    ) -> Result<(), FetchError> {
        let args = downloader_args(programme_id, save_path, &self.downloader.extra_args);
        debug!(program = %self.downloader.program.display(), ?args, "Spawning download utility");

        let mut child = Command::new(&self.downloader.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| FetchError::Launch {
                program: self.downloader.program.clone(),
                error: e,
            })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let relay_stdout = async {
            match stdout {
                Some(out) => sink.relay(out).await.map_err(FetchError::from),
                None => Ok(0),
            }
        };
        let relay_stderr = async {
            match stderr {
                Some(err) => sink.relay(err).await.map_err(FetchError::from),
                None => Ok(0),
            }
        };
        let wait = async { child.wait().await.map_err(FetchError::Wait) };

        // On a relay failure the child is dropped here and killed
        let (_, _, status) = tokio::try_join!(relay_stdout, relay_stderr, wait)?;

        if !status.success() {
            warn!(pid = %programme_id, %status, "Download utility failed");
            return Err(FetchError::Exit { status });
        }
        Ok(())
    }
}

/// Regular files under `root`, depth-first, sorted by file name.
async fn list_files(root: PathBuf) -> Result<Vec<PathBuf>, FetchError> {
    let path = root.clone();
    tokio::task::spawn_blocking(move || {
        let mut files = Vec::new();
        for entry in WalkDir::new(&root).sort_by_file_name() {
            let entry = entry.map_err(|e| FetchError::ListFiles {
                path: root.clone(),
                reason: e.to_string(),
            })?;
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }
        Ok(files)
    })
    .await
    .map_err(|e| FetchError::ListFiles {
        path,
        reason: e.to_string(),
    })?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downloader_args() {
        let args = downloader_args(
            "m0008bbc",
            Path::new("/data/download-pid-m0008bbc-a1b2c3"),
            &["--tvmode=best".to_string()],
        );
        assert_eq!(
            args,
            vec![
                "--nocopyright",
                "--subdir",
                "--whitespace",
                "--pid-recursive",
                "--force",
                "--pid=m0008bbc",
                "--output=/data/download-pid-m0008bbc-a1b2c3",
                "--tvmode=best",
            ]
        );
    }

    #[tokio::test]
    async fn test_list_files_skips_directories_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("run-1");
        tokio::fs::create_dir_all(root.join("Show")).await.unwrap();
        tokio::fs::write(root.join("Show/b.mp4"), b"b").await.unwrap();
        tokio::fs::write(root.join("Show/a.srt"), b"a").await.unwrap();

        let files = list_files(root.clone()).await.unwrap();
        assert_eq!(files, vec![root.join("Show/a.srt"), root.join("Show/b.mp4")]);
    }

    #[tokio::test]
    async fn test_list_files_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let err = list_files(dir.path().join("absent")).await.unwrap_err();
        assert!(matches!(err, FetchError::ListFiles { .. }));
    }

    #[cfg(unix)]
    mod with_fake_utility {
        use super::*;
        use crate::activities::FETCH_ACTIVITY;
        use crate::bus::BusError;
        use crate::catalogue::ProgrammeMetadata;
        use crate::config::DownloaderConfig;
        use crate::testing::fixtures;
        use crate::testing::{MockCatalogue, MockMessageBus, MockObjectStore, RecordingHeartbeater};
        use std::sync::Arc;
        use std::time::Duration;

        fn activities(program: PathBuf, output_dir: &Path, bus: Arc<MockMessageBus>) -> Activities {
            let downloader = DownloaderConfig {
                program,
                heartbeat_interval_secs: 1,
                ..DownloaderConfig::new(output_dir)
            };
            Activities::new(
                downloader,
                bus,
                Arc::new(MockObjectStore::new()),
                Arc::new(MockCatalogue::with_programme(
                    "m0008bbc",
                    ProgrammeMetadata {
                        episode_title: "Episode".to_string(),
                        show_title: "Show".to_string(),
                        episode_number: 1,
                        series_number: 1,
                        media_type: Default::default(),
                    },
                )),
                "programmes",
            )
        }

        fn context(heartbeater: Arc<RecordingHeartbeater>) -> ActivityContext {
            ActivityContext::new("run-1", FETCH_ACTIVITY, 1, heartbeater)
        }

        #[tokio::test]
        async fn test_download_lists_files_and_relays_output() {
            let dir = tempfile::tempdir().unwrap();
            let program = fixtures::fake_downloader(dir.path(), &["b.mp4", "a.srt"], 0);
            let bus = Arc::new(MockMessageBus::new());
            let acts = activities(program, &dir.path().join("out"), bus.clone());
            let heartbeater = Arc::new(RecordingHeartbeater::new());

            let result = acts
                .download_by_pid(&context(heartbeater), &DownloadRequest::new("m0008bbc"))
                .await
                .unwrap();

            let save_path = dir.path().join("out").join("run-1");
            assert_eq!(result.save_path, save_path);
            assert_eq!(
                result.files,
                vec![save_path.join("a.srt"), save_path.join("b.mp4")]
            );

            let log = bus.messages_on("log.run-1").await.concat();
            assert!(log.contains("INFO: Downloading m0008bbc"));
            assert!(log.contains("progress to stderr"));
            assert!(log.ends_with("Programme downloaded"));
        }

        #[tokio::test]
        async fn test_non_zero_exit_fails_and_stops_heartbeat() {
            let dir = tempfile::tempdir().unwrap();
            let program = fixtures::fake_downloader(dir.path(), &[], 3);
            let bus = Arc::new(MockMessageBus::new());
            let acts = activities(program, &dir.path().join("out"), bus.clone());
            let heartbeater = Arc::new(RecordingHeartbeater::new());

            let err = acts
                .download_by_pid(&context(heartbeater.clone()), &DownloadRequest::new("m0008bbc"))
                .await
                .unwrap_err();

            assert!(matches!(err, FetchError::Exit { .. }));
            assert!(err.is_retryable());
            let seen = heartbeater.count();
            tokio::time::sleep(Duration::from_millis(1500)).await;
            assert_eq!(heartbeater.count(), seen);
            assert!(!bus
                .messages_on("log.run-1")
                .await
                .contains(&"Programme downloaded".to_string()));
        }

        #[tokio::test]
        async fn test_launch_failure_stops_heartbeat() {
            let dir = tempfile::tempdir().unwrap();
            let bus = Arc::new(MockMessageBus::new());
            let acts = activities(
                dir.path().join("no-such-utility"),
                &dir.path().join("out"),
                bus,
            );
            let heartbeater = Arc::new(RecordingHeartbeater::new());

            let err = acts
                .download_by_pid(&context(heartbeater.clone()), &DownloadRequest::new("m0008bbc"))
                .await
                .unwrap_err();

            assert!(matches!(err, FetchError::Launch { .. }));
            tokio::time::sleep(Duration::from_millis(1500)).await;
            assert_eq!(heartbeater.count(), 0);
        }

        #[tokio::test]
        async fn test_heartbeats_while_utility_runs() {
            let dir = tempfile::tempdir().unwrap();
            let program = fixtures::slow_downloader(dir.path(), 3);
            let bus = Arc::new(MockMessageBus::new());
            let acts = activities(program, &dir.path().join("out"), bus);
            let heartbeater = Arc::new(RecordingHeartbeater::new());

            acts.download_by_pid(&context(heartbeater.clone()), &DownloadRequest::new("m0008bbc"))
                .await
                .unwrap();

            let beats = heartbeater.count();
            assert!(beats >= 1, "expected heartbeats, got {beats}");
            tokio::time::sleep(Duration::from_millis(1500)).await;
            assert_eq!(heartbeater.count(), beats);
        }

        #[tokio::test]
        async fn test_bus_failure_fails_activity() {
            let dir = tempfile::tempdir().unwrap();
            let program = fixtures::fake_downloader(dir.path(), &["a.mp4"], 0);
            let bus = Arc::new(MockMessageBus::new());
            bus.fail_all(BusError::Closed).await;
            let acts = activities(program, &dir.path().join("out"), bus);

            let err = acts
                .download_by_pid(
                    &context(Arc::new(RecordingHeartbeater::new())),
                    &DownloadRequest::new("m0008bbc"),
                )
                .await
                .unwrap_err();
            assert!(matches!(err, FetchError::Relay(_)));
        }
    }
}
