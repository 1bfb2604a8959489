//! Activity inputs and outputs.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::catalogue::ProgrammeMetadata;
use crate::store::ObjectLocator;

/// Input of a top-level download run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRequest {
    pub programme_id: String,
}

impl DownloadRequest {
    pub fn new(programme_id: impl Into<String>) -> Self {
        Self {
            programme_id: programme_id.into(),
        }
    }
}

/// Output of the fetch activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchResult {
    pub programme_id: String,
    /// Directory the utility wrote into: `<output_dir>/<workflow_id>`.
    pub save_path: PathBuf,
    /// Every regular file under `save_path`, sorted by file name.
    pub files: Vec<PathBuf>,
}

impl FetchResult {
    /// One task per fetched file, in file order.
    pub fn file_tasks(&self) -> Vec<FileTask> {
        self.files
            .iter()
            .map(|file| FileTask {
                programme_id: self.programme_id.clone(),
                save_path: self.save_path.clone(),
                source_file: file.clone(),
                target_name: None,
            })
            .collect()
    }
}

/// Unit of work for one child workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileTask {
    pub programme_id: String,
    pub save_path: PathBuf,
    pub source_file: PathBuf,
    /// Set once the metadata activity has resolved a name.
    pub target_name: Option<String>,
}

impl FileTask {
    /// Returns the task with its resolved target name.
    pub fn with_target_name(self, name: impl Into<String>) -> Self {
        Self {
            target_name: Some(name.into()),
            ..self
        }
    }
}

/// Output of the metadata activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgrammeName {
    pub name: String,
    pub metadata: ProgrammeMetadata,
}

/// Output of the publish activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResult {
    pub programme_id: String,
    /// Id of the child workflow that uploaded the file.
    pub workflow_id: String,
    pub locator: ObjectLocator,
}
