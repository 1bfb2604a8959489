//! Side-effecting units of work scheduled by the workflows.
//!
//! - `download_by_pid` runs the external download utility for one PID
//! - `generate_programme_name` resolves a file's target name from the catalogue
//! - `upload_file` publishes one file to the object store
//!
//! Activities do not retry; they classify failures and leave retries to the
//! engine.

mod error;
mod fetch;
mod metadata;
mod publish;
mod types;

pub use error::{FetchError, MetadataError, PublishError};
pub use fetch::downloader_args;
pub use types::{DownloadRequest, FetchResult, FileTask, ProgrammeName, UploadResult};

use std::sync::Arc;

use crate::bus::MessageBus;
use crate::catalogue::ProgrammeCatalogue;
use crate::config::DownloaderConfig;
use crate::store::ObjectStore;

pub const FETCH_ACTIVITY: &str = "download_by_pid";
pub const METADATA_ACTIVITY: &str = "generate_programme_name";
pub const PUBLISH_ACTIVITY: &str = "upload_file";

/// Collaborators shared by every activity.
pub struct Activities {
    downloader: DownloaderConfig,
    bus: Arc<dyn MessageBus>,
    store: Arc<dyn ObjectStore>,
    catalogue: Arc<dyn ProgrammeCatalogue>,
    bucket: String,
}

impl Activities {
    pub fn new(
        downloader: DownloaderConfig,
        bus: Arc<dyn MessageBus>,
        store: Arc<dyn ObjectStore>,
        catalogue: Arc<dyn ProgrammeCatalogue>,
        bucket: impl Into<String>,
    ) -> Self {
        Self {
            downloader,
            bus,
            store,
            catalogue,
            bucket: bucket.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn downloader(&self) -> &DownloaderConfig {
        &self.downloader
    }
}
