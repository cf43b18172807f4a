use async_trait::async_trait;
use aws_config::Region;
use aws_credential_types::Credentials;

use crate::config::S3BucketConfig;

/// Outbound seam for deleting stored listing images.
#[async_trait]
pub trait AssetStore: Send + Sync {
    async fn delete_object(&self, key: &str) -> Result<(), AssetError>;
}

/// Object storage operation error.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("object storage request failed: {0}")]
    Backend(String),
}

/// Derive the internal storage key from a public image URL.
///
/// Only URLs under the configured public base are ours to delete; anything
/// else (externally hosted, malformed, or bare-base URLs) yields `None` and
/// is left alone.
pub fn object_key_from_public_url(public_base: &str, url: &str) -> Option<String> {
    let base = public_base.trim_end_matches('/');
    if base.is_empty() {
        return None;
    }
    let key = url.strip_prefix(base)?.strip_prefix('/')?;
    if key.is_empty() {
        None
    } else {
        Some(key.to_string())
    }
}

/// S3-compatible asset store; also fronts R2-style endpoints via the custom
/// endpoint URL and path-style addressing.
#[derive(Debug, Clone)]
pub struct S3AssetStore {
    bucket: String,
    client: aws_sdk_s3::Client,
}

impl S3AssetStore {
    pub fn new(config: &S3BucketConfig) -> Self {
        let credentials = Credentials::from_keys(
            config.access_key.clone(),
            config.secret_key.clone(),
            None,
        );

        let s3_config = if let Some(endpoint) = &config.endpoint {
            aws_sdk_s3::config::Builder::new().endpoint_url(endpoint)
        } else {
            aws_sdk_s3::config::Builder::new()
        }
        .region(Region::new(config.region.clone()))
        .credentials_provider(credentials)
        .force_path_style(true)
        .build();

        Self {
            bucket: config.name.clone(),
            client: aws_sdk_s3::Client::from_conf(s3_config),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl AssetStore for S3AssetStore {
    async fn delete_object(&self, key: &str) -> Result<(), AssetError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| AssetError::Backend(err.to_string()))?;
        Ok(())
    }
}

/// Stand-in used when object storage is not configured; every delete is a
/// logged no-op so record deletion still proceeds.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAssetStore;

#[async_trait]
impl AssetStore for NullAssetStore {
    async fn delete_object(&self, key: &str) -> Result<(), AssetError> {
        tracing::debug!(key, "object storage not configured; skipping asset deletion");
        Ok(())
    }
}
