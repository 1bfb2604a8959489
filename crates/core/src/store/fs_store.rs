//! Directory-backed object store.
//!
//! Layout: `<root>/<bucket>/<key>` for object bytes and
//! `<root>/<bucket>/.meta/<key>.json` for the object's metadata. Objects are
//! written to a staging file first and renamed into place, so readers never
//! see a partial object and re-uploading a key replaces it.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader, BufWriter};
use tracing::{debug, info, warn};

use super::{validate_key, ObjectLocator, ObjectStore, PutObjectRequest, StoreError};

const META_DIR: &str = ".meta";
const STAGING_DIR: &str = ".staging";
const BUFFER_SIZE: usize = 64 * 1024;

#[derive(Debug, Serialize, Deserialize)]
struct ObjectMeta {
    content_type: String,
    etag: String,
    size: u64,
}

/// Staging file that is removed on drop unless it was moved into place.
///
/// Covers error returns as well as an upload future dropped mid-copy.
struct StagingFile {
    path: PathBuf,
    committed: bool,
}

impl StagingFile {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            committed: false,
        }
    }

    async fn commit(mut self, destination: &Path) -> std::io::Result<()> {
        fs::rename(&self.path, destination).await?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for StagingFile {
    fn drop(&mut self) {
        if !self.committed {
            if let Err(e) = std::fs::remove_file(&self.path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %self.path.display(), error = %e, "Failed to remove staging file");
                }
            }
        }
    }
}

/// Object store rooted at a local directory; each bucket is a subdirectory.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates the bucket directory if it does not exist.
    pub async fn create_bucket(&self, bucket: &str) -> Result<(), StoreError> {
        validate_key(bucket)?;
        fs::create_dir_all(self.root.join(bucket))
            .await
            .map_err(|e| StoreError::UploadFailed {
                key: bucket.to_string(),
                error: e,
            })
    }

    fn object_path(&self, bucket: &str, key: &str) -> PathBuf {
        self.root.join(bucket).join(key)
    }

    fn meta_path(&self, bucket: &str, key: &str) -> PathBuf {
        self.root
            .join(bucket)
            .join(META_DIR)
            .join(format!("{}.json", key))
    }

    /// Copies `source` to `destination`, returning size and sha256.
    async fn copy_hashed(
        source: &Path,
        destination: &Path,
        key: &str,
    ) -> Result<(u64, String), StoreError> {
        let upload_failed = |e| StoreError::UploadFailed {
            key: key.to_string(),
            error: e,
        };

        let source_file = File::open(source).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::SourceNotFound {
                    path: source.to_path_buf(),
                }
            } else {
                upload_failed(e)
            }
        })?;
        let dest_file = File::create(destination).await.map_err(upload_failed)?;

        let mut reader = BufReader::with_capacity(BUFFER_SIZE, source_file);
        let mut writer = BufWriter::with_capacity(BUFFER_SIZE, dest_file);
        let mut hasher = Sha256::new();
        let mut total_bytes = 0u64;
        let mut buffer = vec![0u8; BUFFER_SIZE];

        loop {
            let bytes_read = reader.read(&mut buffer).await.map_err(upload_failed)?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
            writer
                .write_all(&buffer[..bytes_read])
                .await
                .map_err(upload_failed)?;
            total_bytes += bytes_read as u64;
        }
        writer.flush().await.map_err(upload_failed)?;

        Ok((total_bytes, format!("{:x}", hasher.finalize())))
    }

    async fn ensure_parent(path: &Path, key: &str) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::UploadFailed {
                    key: key.to_string(),
                    error: e,
                })?;
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    fn name(&self) -> &str {
        "fs"
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool, StoreError> {
        if validate_key(bucket).is_err() {
            return Ok(false);
        }
        match fs::metadata(self.root.join(bucket)).await {
            Ok(meta) => Ok(meta.is_dir()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::Metadata(e.to_string())),
        }
    }

    async fn put_object(&self, request: PutObjectRequest) -> Result<ObjectLocator, StoreError> {
        validate_key(&request.key)?;
        if !self.bucket_exists(&request.bucket).await? {
            return Err(StoreError::BucketNotFound(request.bucket));
        }

        let destination = self.object_path(&request.bucket, &request.key);
        let staging = StagingFile::new(
            self.root
                .join(&request.bucket)
                .join(STAGING_DIR)
                .join(uuid::Uuid::new_v4().simple().to_string()),
        );

        Self::ensure_parent(&staging.path, &request.key).await?;
        Self::ensure_parent(&destination, &request.key).await?;

        let (size, etag) =
            Self::copy_hashed(&request.file_path, &staging.path, &request.key).await?;

        staging
            .commit(&destination)
            .await
            .map_err(|e| StoreError::UploadFailed {
                key: request.key.clone(),
                error: e,
            })?;

        let meta = ObjectMeta {
            content_type: request.content_type.clone(),
            etag: etag.clone(),
            size,
        };
        let meta_path = self.meta_path(&request.bucket, &request.key);
        Self::ensure_parent(&meta_path, &request.key).await?;
        let meta_json =
            serde_json::to_vec_pretty(&meta).map_err(|e| StoreError::Metadata(e.to_string()))?;
        fs::write(&meta_path, meta_json)
            .await
            .map_err(|e| StoreError::Metadata(e.to_string()))?;

        info!(
            bucket = %request.bucket,
            key = %request.key,
            size,
            content_type = %request.content_type,
            "Stored object"
        );

        Ok(ObjectLocator {
            bucket: request.bucket,
            key: request.key,
            etag,
            size,
            content_type: request.content_type,
        })
    }

    async fn head_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<Option<ObjectLocator>, StoreError> {
        validate_key(key)?;
        let meta_path = self.meta_path(bucket, key);
        let raw = match fs::read(&meta_path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(bucket, key, "Object not found");
                return Ok(None);
            }
            Err(e) => return Err(StoreError::Metadata(e.to_string())),
        };
        let meta: ObjectMeta =
            serde_json::from_slice(&raw).map_err(|e| StoreError::Metadata(e.to_string()))?;

        Ok(Some(ObjectLocator {
            bucket: bucket.to_string(),
            key: key.to_string(),
            etag: meta.etag,
            size: meta.size,
            content_type: meta.content_type,
        }))
    }
}
