//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of every collaborator trait,
//! so workflows and activities can be exercised without a message bus,
//! object store or catalogue API.
//!
//! # Example
//!
//! ```rust,ignore
//! use beeb_core::testing::{MockCatalogue, MockMessageBus, MockObjectStore};
//!
//! let bus = Arc::new(MockMessageBus::new());
//! let store = Arc::new(MockObjectStore::new());
//! let catalogue = Arc::new(MockCatalogue::new());
//!
//! // Run a workflow, then inspect what was published and stored
//! let notices = bus.messages_on("log.run-1").await;
//! let keys = store.keys("programmes").await;
//! ```

mod heartbeater;
mod mock_bus;
mod mock_catalogue;
mod mock_store;

pub use heartbeater::RecordingHeartbeater;
pub use mock_bus::MockMessageBus;
pub use mock_catalogue::MockCatalogue;
pub use mock_store::MockObjectStore;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::{Path, PathBuf};

    use crate::catalogue::{MediaType, ProgrammeMetadata};
    use crate::config::{
        BusConfig, CatalogueConfig, Config, DownloaderConfig, LoggingConfig, RetryConfig,
        ServerConfig, StoreConfig, WorkflowConfig,
    };

    /// Metadata for an episode of a series.
    pub fn programme_metadata(
        show: &str,
        episode: &str,
        series_number: u32,
        episode_number: u32,
    ) -> ProgrammeMetadata {
        ProgrammeMetadata {
            episode_title: episode.to_string(),
            show_title: show.to_string(),
            episode_number,
            series_number,
            media_type: MediaType::Other,
        }
    }

    /// Metadata for a standalone piece such as a film.
    pub fn standalone_metadata(title: &str) -> ProgrammeMetadata {
        programme_metadata("", title, 0, 0)
    }

    /// A full configuration rooted at `root`, with millisecond retry delays.
    pub fn test_config(root: &Path) -> Config {
        Config {
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
            downloader: DownloaderConfig {
                heartbeat_interval_secs: 1,
                ..DownloaderConfig::new(root.join("downloads"))
            },
            catalogue: CatalogueConfig::default(),
            store: StoreConfig {
                root: root.join("objects"),
                bucket: "programmes".to_string(),
            },
            bus: BusConfig::default(),
            workflow: WorkflowConfig {
                heartbeat_timeout_secs: 30,
                retry: RetryConfig {
                    initial_interval_ms: 10,
                    backoff_coefficient: 2.0,
                    maximum_interval_ms: 100,
                    maximum_attempts: 3,
                },
                ..WorkflowConfig::default()
            },
        }
    }

    #[cfg(unix)]
    fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        let script = format!(
            "#!/bin/sh\nout=\"\"\npid=\"\"\nfor arg in \"$@\"; do\n  case \"$arg\" in\n    \
             --output=*) out=\"${{arg#--output=}}\" ;;\n    \
             --pid=*) pid=\"${{arg#--pid=}}\" ;;\n  esac\ndone\n{}",
            body
        );
        std::fs::write(&path, script).expect("write fake utility");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("make fake utility executable");
        path
    }

    /// A stand-in for the download utility.
    ///
    /// Prints to stdout and stderr, creates `files` under the `--output`
    /// directory and exits with `exit_code`.
    #[cfg(unix)]
    pub fn fake_downloader(dir: &Path, files: &[&str], exit_code: i32) -> PathBuf {
        let mut body = String::from(
            "echo \"INFO: Downloading $pid\"\necho \"progress to stderr\" >&2\nmkdir -p \"$out\"\n",
        );
        for file in files {
            body.push_str(&format!(
                "printf 'programme file %s\\n' \"{file}\" > \"$out/{file}\"\n"
            ));
        }
        body.push_str(&format!("exit {}\n", exit_code));
        write_script(dir, "get_iplayer", &body)
    }

    /// A download utility that runs for `secs` seconds before producing one
    /// file.
    #[cfg(unix)]
    pub fn slow_downloader(dir: &Path, secs: u64) -> PathBuf {
        let body = format!(
            "echo \"INFO: Downloading $pid\"\nsleep {secs}\nmkdir -p \"$out\"\n\
             printf 'slow\\n' > \"$out/slow.mp4\"\n"
        );
        write_script(dir, "get_iplayer_slow", &body)
    }

    /// A download utility that fails `failures` times, then succeeds.
    ///
    /// Attempts are counted in a file next to the script.
    #[cfg(unix)]
    pub fn flaky_downloader(dir: &Path, failures: u32, files: &[&str]) -> PathBuf {
        let counter = dir.join("attempts");
        let mut body = format!(
            "n=$(cat \"{c}\" 2>/dev/null || echo 0)\nn=$((n + 1))\necho $n > \"{c}\"\n\
             if [ $n -le {failures} ]; then\n  echo \"ERROR: attempt $n failed\" >&2\n  exit 1\nfi\n\
             mkdir -p \"$out\"\n",
            c = counter.display()
        );
        for file in files {
            body.push_str(&format!(
                "printf 'programme file %s\\n' \"{file}\" > \"$out/{file}\"\n"
            ));
        }
        write_script(dir, "get_iplayer_flaky", &body)
    }

    /// How many times a [`flaky_downloader`] in `dir` has been run.
    pub fn downloader_attempts(dir: &Path) -> u32 {
        std::fs::read_to_string(dir.join("attempts"))
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0)
    }
}
