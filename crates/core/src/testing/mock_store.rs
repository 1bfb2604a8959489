//! Mock object store for testing.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::store::{ObjectLocator, ObjectStore, PutObjectRequest, StoreError};

/// Mock implementation of the ObjectStore trait.
///
/// Objects are kept in memory, keyed by `(bucket, key)`. The file named in a
/// put request is read so that sizes and etags reflect real content.
#[derive(Debug, Default)]
pub struct MockObjectStore {
    objects: Arc<RwLock<HashMap<(String, String), ObjectLocator>>>,
    puts: Arc<RwLock<Vec<PutObjectRequest>>>,
    missing_buckets: Arc<RwLock<HashSet<String>>>,
    rejected_keys: Arc<RwLock<HashSet<String>>>,
    next_error: Arc<RwLock<Option<StoreError>>>,
    stalled: Arc<RwLock<bool>>,
}

impl MockObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get every put request in arrival order, including failed ones.
    pub async fn recorded_puts(&self) -> Vec<PutObjectRequest> {
        self.puts.read().await.clone()
    }

    /// Keys of the stored objects in `bucket`, sorted.
    pub async fn keys(&self, bucket: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .objects
            .read()
            .await
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    pub async fn object_count(&self) -> usize {
        self.objects.read().await.len()
    }

    /// Make `bucket_exists` report `bucket` as absent.
    pub async fn remove_bucket(&self, bucket: &str) {
        self.missing_buckets.write().await.insert(bucket.to_string());
    }

    /// Reject every put for `key` with a permanent error.
    pub async fn reject_key(&self, key: &str) {
        self.rejected_keys.write().await.insert(key.to_string());
    }

    /// Make every later put hang after it is recorded, until the caller is
    /// cancelled.
    pub async fn stall_puts(&self) {
        *self.stalled.write().await = true;
    }

    /// Configure the next put to fail with the given error.
    pub async fn set_next_error(&self, error: StoreError) {
        *self.next_error.write().await = Some(error);
    }
}

#[async_trait]
impl ObjectStore for MockObjectStore {
    fn name(&self) -> &str {
        "mock"
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool, StoreError> {
        Ok(!self.missing_buckets.read().await.contains(bucket))
    }

    async fn put_object(&self, request: PutObjectRequest) -> Result<ObjectLocator, StoreError> {
        self.puts.write().await.push(request.clone());

        let stalled = *self.stalled.read().await;
        if stalled {
            std::future::pending::<()>().await;
        }

        if let Some(err) = self.next_error.write().await.take() {
            return Err(err);
        }
        if self.rejected_keys.read().await.contains(&request.key) {
            return Err(StoreError::InvalidKey(request.key));
        }
        if self.missing_buckets.read().await.contains(&request.bucket) {
            return Err(StoreError::BucketNotFound(request.bucket));
        }

        let bytes = tokio::fs::read(&request.file_path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::SourceNotFound {
                    path: request.file_path.clone(),
                }
            } else {
                StoreError::UploadFailed {
                    key: request.key.clone(),
                    error: e,
                }
            }
        })?;

        let locator = ObjectLocator {
            bucket: request.bucket.clone(),
            key: request.key.clone(),
            etag: format!("{:x}", Sha256::digest(&bytes)),
            size: bytes.len() as u64,
            content_type: request.content_type,
        };
        self.objects
            .write()
            .await
            .insert((request.bucket, request.key), locator.clone());
        Ok(locator)
    }

    async fn head_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<Option<ObjectLocator>, StoreError> {
        Ok(self
            .objects
            .read()
            .await
            .get(&(bucket.to_string(), key.to_string()))
            .cloned())
    }
}
