use crate::config::S3Config;
use crate::storage::{ObjectStore, StorageError};
use async_trait::async_trait;
use aws_config::retry::RetryConfig;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Builder as S3ConfigBuilder;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client as S3Client;
use tracing::{debug, info, instrument, warn};

/// S3-backed object store for course assets
pub struct S3ObjectStore {
    client: S3Client,
    bucket: String,
    config: S3Config,
}

impl S3ObjectStore {
    /// Create a new S3 object store
    pub async fn new(config: &S3Config) -> Self {
        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()))
            .retry_config(RetryConfig::standard().with_max_attempts(config.max_attempts))
            .load()
            .await;

        let mut s3_config_builder = S3ConfigBuilder::from(&aws_config);

        // Custom endpoint for MinIO/LocalStack
        if let Some(ref endpoint_url) = config.endpoint_url {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint_url);
        }

        if config.force_path_style {
            s3_config_builder = s3_config_builder.force_path_style(true);
        }

        let client = S3Client::from_conf(s3_config_builder.build());

        info!(
            bucket = %config.bucket,
            region = %config.region,
            "S3 object store initialized"
        );

        Self {
            client,
            bucket: config.bucket.clone(),
            config: config.clone(),
        }
    }

    /// Get the bucket name
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Simple single-part upload for small files
    async fn simple_upload(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::Request(e.to_string()))?;

        Ok(())
    }

    /// Multipart upload for large files such as lesson videos
    async fn multipart_upload(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let create_response = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::Multipart(e.to_string()))?;

        let upload_id = create_response
            .upload_id()
            .ok_or_else(|| StorageError::Multipart("no upload ID in response".to_string()))?
            .to_string();

        match self.upload_parts(key, &upload_id, &data).await {
            Ok(parts) => {
                let completed_upload = CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build();

                self.client
                    .complete_multipart_upload()
                    .bucket(&self.bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .multipart_upload(completed_upload)
                    .send()
                    .await
                    .map_err(|e| StorageError::Multipart(e.to_string()))?;

                Ok(())
            }
            Err(e) => {
                // Drop the parts already stored for this upload
                if let Err(abort_err) = self
                    .client
                    .abort_multipart_upload()
                    .bucket(&self.bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .send()
                    .await
                {
                    warn!(key = %key, error = %abort_err, "Failed to abort multipart upload");
                }
                Err(e)
            }
        }
    }

    async fn upload_parts(
        &self,
        key: &str,
        upload_id: &str,
        data: &[u8],
    ) -> Result<Vec<CompletedPart>, StorageError> {
        let mut completed_parts = Vec::new();
        let part_size = part_size(self.config.part_size_bytes);

        for (index, chunk) in data.chunks(part_size).enumerate() {
            let part_number = index as i32 + 1;

            let upload_part_response = self
                .client
                .upload_part()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(ByteStream::from(chunk.to_vec()))
                .send()
                .await
                .map_err(|e| {
                    StorageError::Multipart(format!("part {}: {}", part_number, e))
                })?;

            completed_parts.push(
                CompletedPart::builder()
                    .part_number(part_number)
                    .e_tag(upload_part_response.e_tag().unwrap_or_default())
                    .build(),
            );
        }

        Ok(completed_parts)
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    #[instrument(skip(self, data), fields(bucket = %self.bucket, size_bytes = data.len()))]
    async fn put_object(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        debug!(key = %key, content_type = %content_type, "Uploading object to S3");

        if use_multipart(data.len(), self.config.multipart_threshold_bytes) {
            self.multipart_upload(key, data, content_type).await
        } else {
            self.simple_upload(key, data, content_type).await
        }
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn delete_object(&self, key: &str) -> Result<(), StorageError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::Request(e.to_string()))?;

        debug!(key = %key, "Object deleted from S3");
        Ok(())
    }
}

// S3 rejects non-final parts smaller than 5 MiB
const MIN_PART_SIZE_BYTES: usize = 5 * 1024 * 1024;

fn use_multipart(size_bytes: usize, threshold_bytes: usize) -> bool {
    size_bytes > threshold_bytes
}

fn part_size(configured_bytes: usize) -> usize {
    configured_bytes.max(MIN_PART_SIZE_BYTES)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_use_multipart() {
        let threshold = 8 * 1024 * 1024;
        assert!(!use_multipart(0, threshold));
        assert!(!use_multipart(threshold, threshold));
        assert!(use_multipart(threshold + 1, threshold));
    }

    #[test]
    fn test_part_size_respects_s3_minimum() {
        assert_eq!(part_size(0), MIN_PART_SIZE_BYTES);
        assert_eq!(part_size(1024), MIN_PART_SIZE_BYTES);
        assert_eq!(part_size(16 * 1024 * 1024), 16 * 1024 * 1024);
    }
}
