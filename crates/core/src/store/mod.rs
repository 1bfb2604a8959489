//! Object store abstraction.
//!
//! Uploads are keyed by the resolved target name. `put_object` overwrites an
//! existing key, so a retried upload lands on the same object.

mod content_type;
mod fs_store;

pub use content_type::{detect_content_type, detect_file_content_type, SNIFF_LEN};
pub use fs_store::FsObjectStore;

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when talking to the object store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The target bucket does not exist.
    #[error("Bucket not found: {0}")]
    BucketNotFound(String),

    /// The key cannot be stored (empty, absolute or escaping the bucket).
    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    /// The local file to upload does not exist.
    #[error("Source file not found: {path}")]
    SourceNotFound { path: PathBuf },

    /// I/O failure while uploading.
    #[error("Upload of {key} failed: {error}")]
    UploadFailed {
        key: String,
        #[source]
        error: std::io::Error,
    },

    /// Failure in the store's metadata layer.
    #[error("Object metadata error: {0}")]
    Metadata(String),
}

impl StoreError {
    /// Whether retrying the same request could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::UploadFailed { .. } | Self::Metadata(_))
    }
}

/// Parameters for one upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutObjectRequest {
    pub bucket: String,
    pub key: String,
    pub file_path: PathBuf,
    pub content_type: String,
}

/// Receipt returned by the store for a stored object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ObjectLocator {
    pub bucket: String,
    pub key: String,
    /// Content hash of the stored bytes.
    pub etag: String,
    pub size: u64,
    pub content_type: String,
}

impl std::fmt::Display for ObjectLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

/// An object store holding uploaded programmes.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Returns the name of this store implementation.
    fn name(&self) -> &str;

    /// Checks whether `bucket` exists. Called once at start-up.
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, StoreError>;

    /// Uploads a local file, overwriting any object at the same key.
    async fn put_object(&self, request: PutObjectRequest) -> Result<ObjectLocator, StoreError>;

    /// Returns the locator of an existing object.
    async fn head_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<Option<ObjectLocator>, StoreError>;
}

/// Rejects keys that could escape the bucket directory.
pub(crate) fn validate_key(key: &str) -> Result<(), StoreError> {
    let invalid = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.split('/').any(|part| part.is_empty() || part == "." || part == "..");
    if invalid {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}
