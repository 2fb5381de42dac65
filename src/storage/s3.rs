//! S3-backed implementation of [`ObjectStore`].

use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use aws_sdk_s3::Client;
use aws_types::region::Region as AwsRegion;
use tracing::{debug, info, warn};

use crate::config::S3Config;
use crate::storage::{
    BatchDeleteOutcome, ObjectListing, ObjectStore, PresignOperation, DELETE_BATCH_LIMIT,
};

#[derive(Debug, Clone)]
pub struct S3Storage {
    client: Client,
    config: S3Config,
}

impl S3Storage {
    pub fn new(config: S3Config) -> Result<Self> {
        if config.bucket_name.is_empty() {
            return Err(anyhow!("Bucket name is required"));
        }
        if config.access_key_id.is_empty() {
            return Err(anyhow!("Access key ID is required"));
        }
        if config.secret_access_key.is_empty() {
            return Err(anyhow!("Secret access key is required"));
        }

        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None, // session token
            None, // expiry
            "docvault-s3",
        );

        let region = if config.region.is_empty() {
            "us-east-1".to_string()
        } else {
            config.region.clone()
        };

        let mut builder = aws_sdk_s3::Config::builder()
            .region(AwsRegion::new(region))
            .credentials_provider(credentials)
            .behavior_version_latest();

        // Custom endpoint for S3-compatible services
        if let Some(endpoint_url) = &config.endpoint_url {
            if !endpoint_url.is_empty() {
                builder = builder.endpoint_url(endpoint_url).force_path_style(true);
                info!("Using custom S3 endpoint: {}", endpoint_url);
            }
        }

        let client = Client::from_conf(builder.build());
        Ok(Self { client, config })
    }

    pub fn bucket_name(&self) -> &str {
        &self.config.bucket_name
    }

    /// Retry wrapper for S3 operations with exponential backoff.
    async fn retry_operation<T, F, Fut>(&self, operation_name: &str, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        const MAX_RETRIES: u32 = 3;
        const BASE_DELAY_MS: u64 = 100;

        let mut last_error = None;

        for attempt in 0..=MAX_RETRIES {
            match operation().await {
                Ok(result) => {
                    if attempt > 0 {
                        info!(
                            "S3 operation '{}' succeeded after {} retries",
                            operation_name, attempt
                        );
                    }
                    return Ok(result);
                }
                Err(e) => {
                    last_error = Some(e);

                    if attempt < MAX_RETRIES {
                        let delay_ms = BASE_DELAY_MS * 2u64.pow(attempt);
                        warn!(
                            "S3 operation '{}' failed (attempt {}/{}), retrying in {}ms: {}",
                            operation_name,
                            attempt + 1,
                            MAX_RETRIES + 1,
                            delay_ms,
                            last_error.as_ref().unwrap()
                        );
                        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    }
                }
            }
        }

        Err(last_error.unwrap())
    }
}

#[async_trait]
impl ObjectStore for S3Storage {
    async fn put(&self, key: &str, data: &[u8], content_type: &str) -> Result<()> {
        debug!("Storing object: {}/{}", self.config.bucket_name, key);

        let key_owned = key.to_string();
        let data_owned = data.to_vec();
        let content_type_owned = content_type.to_string();
        let bucket = self.config.bucket_name.clone();
        let client = self.client.clone();

        self.retry_operation(&format!("put: {}", key), || {
            let key = key_owned.clone();
            let data = data_owned.clone();
            let content_type = content_type_owned.clone();
            let bucket = bucket.clone();
            let client = client.clone();

            async move {
                client
                    .put_object()
                    .bucket(&bucket)
                    .key(&key)
                    .content_type(&content_type)
                    .body(ByteStream::from(data))
                    .send()
                    .await
                    .map_err(|e| anyhow!("Failed to store object {}: {}", key, e))?;
                Ok(())
            }
        })
        .await
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        debug!("Retrieving object: {}/{}", self.config.bucket_name, key);

        let key_owned = key.to_string();
        let bucket = self.config.bucket_name.clone();
        let client = self.client.clone();

        self.retry_operation(&format!("get: {}", key), || {
            let key = key_owned.clone();
            let bucket = bucket.clone();
            let client = client.clone();

            async move {
                let response = client
                    .get_object()
                    .bucket(&bucket)
                    .key(&key)
                    .send()
                    .await
                    .map_err(|e| anyhow!("Failed to retrieve object {}: {}", key, e))?;

                let body = response
                    .body
                    .collect()
                    .await
                    .map_err(|e| anyhow!("Failed to read object body: {}", e))?;

                Ok(body.into_bytes().to_vec())
            }
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.config.bucket_name)
            .key(key)
            .send()
            .await
            .map_err(|e| anyhow!("Failed to delete object {}: {}", key, e))?;
        Ok(())
    }

    async fn delete_batch(&self, keys: &[String]) -> Result<BatchDeleteOutcome> {
        if keys.is_empty() {
            return Ok(BatchDeleteOutcome::default());
        }
        if keys.len() > DELETE_BATCH_LIMIT {
            return Err(anyhow!(
                "delete_batch called with {} keys, backend limit is {}",
                keys.len(),
                DELETE_BATCH_LIMIT
            ));
        }

        let mut identifiers = Vec::with_capacity(keys.len());
        for key in keys {
            identifiers.push(
                ObjectIdentifier::builder()
                    .key(key)
                    .build()
                    .map_err(|e| anyhow!("Invalid object identifier {}: {}", key, e))?,
            );
        }

        let delete = Delete::builder()
            .set_objects(Some(identifiers))
            .build()
            .map_err(|e| anyhow!("Failed to build delete request: {}", e))?;

        let response = self
            .client
            .delete_objects()
            .bucket(&self.config.bucket_name)
            .delete(delete)
            .send()
            .await
            .map_err(|e| anyhow!("Bulk delete request failed: {}", e))?;

        let deleted_keys = response
            .deleted()
            .iter()
            .filter_map(|d| d.key().map(|k| k.to_string()))
            .collect();

        let errors = response
            .errors()
            .iter()
            .map(|e| {
                format!(
                    "{}: {}",
                    e.key().unwrap_or("<unknown>"),
                    e.message().unwrap_or("unspecified error")
                )
            })
            .collect();

        Ok(BatchDeleteOutcome {
            deleted_keys,
            errors,
        })
    }

    async fn list(&self, prefix: &str, continuation: Option<String>) -> Result<ObjectListing> {
        let mut request = self
            .client
            .list_objects_v2()
            .bucket(&self.config.bucket_name)
            .prefix(prefix);

        if let Some(token) = &continuation {
            request = request.continuation_token(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| anyhow!("Failed to list objects under {}: {}", prefix, e))?;

        let keys = response
            .contents
            .unwrap_or_default()
            .into_iter()
            .filter_map(|object| object.key)
            // Skip "directory" placeholder keys
            .filter(|key| !key.ends_with('/'))
            .collect();

        let next_token = if response.is_truncated == Some(true) {
            response.next_continuation_token
        } else {
            None
        };

        Ok(ObjectListing { keys, next_token })
    }

    async fn presign(
        &self,
        operation: PresignOperation,
        key: &str,
        expires_in: Duration,
    ) -> Result<String> {
        let presign_config = PresigningConfig::expires_in(expires_in)
            .map_err(|e| anyhow!("Invalid presign expiry: {}", e))?;

        let presigned = match operation {
            PresignOperation::Get => self
                .client
                .get_object()
                .bucket(&self.config.bucket_name)
                .key(key)
                .presigned(presign_config)
                .await
                .map_err(|e| anyhow!("Failed to presign GET for {}: {}", key, e))?,
            PresignOperation::Put => self
                .client
                .put_object()
                .bucket(&self.config.bucket_name)
                .key(key)
                .presigned(presign_config)
                .await
                .map_err(|e| anyhow!("Failed to presign PUT for {}: {}", key, e))?,
        };

        Ok(presigned.uri().to_string())
    }

    fn storage_type(&self) -> &'static str {
        "s3"
    }

    async fn initialize(&self) -> Result<()> {
        // Bucket access check: a bounded listing plus head_bucket
        self.client
            .list_objects_v2()
            .bucket(&self.config.bucket_name)
            .max_keys(1)
            .send()
            .await
            .map_err(|e| anyhow!("Failed to access S3 bucket {}: {}", self.config.bucket_name, e))?;

        self.client
            .head_bucket()
            .bucket(&self.config.bucket_name)
            .send()
            .await
            .map_err(|e| anyhow!("Cannot access bucket {}: {}", self.config.bucket_name, e))?;

        info!("S3 storage backend initialized (bucket: {})", self.config.bucket_name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(bucket: &str) -> S3Config {
        S3Config {
            bucket_name: bucket.to_string(),
            region: "us-east-1".to_string(),
            access_key_id: "test-key".to_string(),
            secret_access_key: "test-secret".to_string(),
            endpoint_url: Some("http://localhost:9000".to_string()),
        }
    }

    #[test]
    fn test_new_requires_bucket_name() {
        let result = S3Storage::new(test_config(""));
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Bucket name is required"));
    }

    #[test]
    fn test_new_with_valid_config() {
        let storage = S3Storage::new(test_config("test-bucket")).unwrap();
        assert_eq!(storage.bucket_name(), "test-bucket");
        assert_eq!(storage.storage_type(), "s3");
    }

    #[tokio::test]
    async fn test_delete_batch_rejects_oversized_request() {
        let storage = S3Storage::new(test_config("test-bucket")).unwrap();
        let keys: Vec<String> = (0..DELETE_BATCH_LIMIT + 1)
            .map(|i| format!("tenants/t_1/documents/raw/d{}/f.pdf", i))
            .collect();
        let result = storage.delete_batch(&keys).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_delete_batch_empty_is_noop() {
        let storage = S3Storage::new(test_config("test-bucket")).unwrap();
        let outcome = storage.delete_batch(&[]).await.unwrap();
        assert!(outcome.deleted_keys.is_empty());
        assert!(outcome.errors.is_empty());
    }
}
