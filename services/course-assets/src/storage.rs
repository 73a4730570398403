use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Errors returned by an object store
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("multipart upload failed: {0}")]
    Multipart(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Object storage the uploader writes assets into
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `data` under `key`
    async fn put_object(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError>;

    /// Remove the object stored under `key`
    async fn delete_object(&self, key: &str) -> Result<(), StorageError>;
}
