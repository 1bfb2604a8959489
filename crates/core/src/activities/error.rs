//! Error types for the activities.

use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

use crate::bus::BusError;
use crate::catalogue::CatalogueError;
use crate::engine::{ActivityFailure, HeartbeatError};
use crate::progress::ProgressError;
use crate::store::StoreError;

/// Errors from the fetch activity. Every variant is retryable.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The download utility could not be started.
    #[error("Failed to launch {}: {error}", program.display())]
    Launch {
        program: PathBuf,
        #[source]
        error: std::io::Error,
    },

    /// The download utility exited unsuccessfully.
    #[error("Download utility exited with {status}")]
    Exit { status: ExitStatus },

    /// Waiting for the utility to exit failed.
    #[error("Failed waiting for download utility: {0}")]
    Wait(#[source] std::io::Error),

    /// Output could not be relayed to the bus.
    #[error("Failed to relay download output: {0}")]
    Relay(#[from] ProgressError),

    #[error("Heartbeat failed: {0}")]
    Heartbeat(#[from] HeartbeatError),

    /// The save directory could not be walked.
    #[error("Failed to list files under {}: {reason}", path.display())]
    ListFiles { path: PathBuf, reason: String },
}

impl FetchError {
    pub fn is_retryable(&self) -> bool {
        true
    }
}

/// Errors from the metadata activity.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("Catalogue lookup failed: {0}")]
    Catalogue(#[from] CatalogueError),
}

impl MetadataError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Catalogue(e) => e.is_retryable(),
        }
    }
}

/// Errors from the publish activity.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The task reached publish without a resolved name.
    #[error("No target name resolved for {}", source_file.display())]
    MissingTargetName { source_file: PathBuf },

    /// The file head could not be read for content detection.
    #[error("Failed to read {} for content detection: {error}", path.display())]
    Detect {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    #[error("Upload failed: {0}")]
    Store(#[from] StoreError),

    /// An upload notice could not be published.
    #[error("Failed to publish upload notice: {0}")]
    Notify(#[from] BusError),
}

impl PublishError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::MissingTargetName { .. } => false,
            Self::Detect { .. } | Self::Notify(_) => true,
            Self::Store(e) => e.is_retryable(),
        }
    }
}

impl From<FetchError> for ActivityFailure {
    fn from(err: FetchError) -> Self {
        ActivityFailure::retryable(err.to_string())
    }
}

impl From<MetadataError> for ActivityFailure {
    fn from(err: MetadataError) -> Self {
        if err.is_retryable() {
            ActivityFailure::retryable(err.to_string())
        } else {
            ActivityFailure::non_retryable(err.to_string())
        }
    }
}

impl From<PublishError> for ActivityFailure {
    fn from(err: PublishError) -> Self {
        if err.is_retryable() {
            ActivityFailure::retryable(err.to_string())
        } else {
            ActivityFailure::non_retryable(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_failure_classification() {
        let unknown: ActivityFailure = MetadataError::from(CatalogueError::UnknownProgramme {
            pid: "b0000000".to_string(),
            status: 404,
        })
        .into();
        assert!(!unknown.is_retryable());
        assert!(unknown.message().contains("b0000000"));
    }

    #[test]
    fn test_publish_failure_classification() {
        let missing: ActivityFailure = PublishError::MissingTargetName {
            source_file: PathBuf::from("/data/run/a.mp4"),
        }
        .into();
        assert!(!missing.is_retryable());

        let notify: ActivityFailure = PublishError::Notify(BusError::Closed).into();
        assert!(notify.is_retryable());

        let bad_key: ActivityFailure =
            PublishError::Store(StoreError::InvalidKey("..".to_string())).into();
        assert!(!bad_key.is_retryable());
    }

    #[test]
    fn test_fetch_failures_are_retryable() {
        let failure: ActivityFailure = FetchError::Wait(std::io::Error::other("boom")).into();
        assert!(failure.is_retryable());
    }
}
