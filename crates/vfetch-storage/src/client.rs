//! S3-compatible storage client.

use std::path::Path;

use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};

/// Configuration for the storage client.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// S3 API endpoint URL
    pub endpoint_url: String,
    /// Access key ID
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Bucket holding downloaded videos
    pub bucket_name: String,
    /// Region ("auto" for R2-style providers)
    pub region: String,
}

impl StorageConfig {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self {
            endpoint_url: std::env::var("STORAGE_ENDPOINT_URL")
                .map_err(|_| StorageError::config_error("STORAGE_ENDPOINT_URL not set"))?,
            access_key_id: std::env::var("STORAGE_ACCESS_KEY_ID")
                .map_err(|_| StorageError::config_error("STORAGE_ACCESS_KEY_ID not set"))?,
            secret_access_key: std::env::var("STORAGE_SECRET_ACCESS_KEY")
                .map_err(|_| StorageError::config_error("STORAGE_SECRET_ACCESS_KEY not set"))?,
            bucket_name: std::env::var("STORAGE_BUCKET")
                .unwrap_or_else(|_| "videos".to_string()),
            region: std::env::var("STORAGE_REGION").unwrap_or_else(|_| "auto".to_string()),
        })
    }
}

/// A downloaded object with the metadata the proxy response needs.
#[derive(Debug, Clone)]
pub struct ObjectDownload {
    pub bytes: Vec<u8>,
    /// Full object size as reported by storage
    pub content_length: u64,
    pub content_type: String,
}

/// Object storage client for the video bucket.
#[derive(Clone)]
pub struct StorageClient {
    client: Client,
    bucket: String,
}

impl StorageClient {
    /// Create a new storage client from configuration.
    pub async fn new(config: StorageConfig) -> StorageResult<Self> {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "vfetch",
        );

        let sdk_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint_url)
            .region(Region::new(config.region))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        let client = Client::from_conf(sdk_config);

        Ok(Self {
            client,
            bucket: config.bucket_name,
        })
    }

    /// Create from environment variables.
    pub async fn from_env() -> StorageResult<Self> {
        let config = StorageConfig::from_env()?;
        Self::new(config).await
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Upload a local file to the bucket.
    pub async fn upload_file(
        &self,
        path: impl AsRef<Path>,
        key: &str,
        content_type: &str,
    ) -> StorageResult<()> {
        let path = path.as_ref();
        debug!("Uploading {} to {}", path.display(), key);

        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        info!("Uploaded {} to {}", path.display(), key);
        Ok(())
    }

    /// Get an object with an optional byte range.
    pub async fn download_object(
        &self,
        key: &str,
        range: Option<&str>,
    ) -> StorageResult<ObjectDownload> {
        debug!("Downloading {}", key);

        let mut request = self.client.get_object().bucket(&self.bucket).key(key);

        if let Some(r) = range {
            request = request.range(r);
        }

        let response = request.send().await.map_err(|e| {
            if e.to_string().contains("NoSuchKey") {
                StorageError::not_found(key)
            } else {
                StorageError::DownloadFailed(e.to_string())
            }
        })?;

        let content_length = response.content_length().unwrap_or(0) as u64;
        let content_type = response
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();

        let bytes = response
            .body
            .collect()
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))?
            .into_bytes()
            .to_vec();

        Ok(ObjectDownload {
            bytes,
            content_length,
            content_type,
        })
    }

    /// Delete an object.
    pub async fn delete_object(&self, key: &str) -> StorageResult<()> {
        debug!("Deleting {}", key);

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::delete_failed(e.to_string()))?;

        Ok(())
    }

    /// Check connectivity by performing a head bucket operation.
    pub async fn check_connectivity(&self) -> StorageResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| StorageError::AwsSdk(format!("Storage connectivity check failed: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Env-var cases run in one test to avoid clobbering between threads.
    #[test]
    fn test_config_from_env() {
        std::env::remove_var("STORAGE_ENDPOINT_URL");
        std::env::remove_var("STORAGE_ACCESS_KEY_ID");
        std::env::remove_var("STORAGE_SECRET_ACCESS_KEY");
        std::env::remove_var("STORAGE_BUCKET");
        std::env::remove_var("STORAGE_REGION");

        let err = StorageConfig::from_env().unwrap_err();
        assert!(matches!(err, StorageError::ConfigError(_)));

        std::env::set_var("STORAGE_ENDPOINT_URL", "https://storage.example.com");
        std::env::set_var("STORAGE_ACCESS_KEY_ID", "key");
        std::env::set_var("STORAGE_SECRET_ACCESS_KEY", "secret");

        let config = StorageConfig::from_env().unwrap();
        assert_eq!(config.endpoint_url, "https://storage.example.com");
        assert_eq!(config.bucket_name, "videos");
        assert_eq!(config.region, "auto");

        std::env::set_var("STORAGE_BUCKET", "media");
        std::env::set_var("STORAGE_REGION", "us-east-1");

        let config = StorageConfig::from_env().unwrap();
        assert_eq!(config.bucket_name, "media");
        assert_eq!(config.region, "us-east-1");

        std::env::remove_var("STORAGE_ENDPOINT_URL");
        std::env::remove_var("STORAGE_ACCESS_KEY_ID");
        std::env::remove_var("STORAGE_SECRET_ACCESS_KEY");
        std::env::remove_var("STORAGE_BUCKET");
        std::env::remove_var("STORAGE_REGION");
    }
}
