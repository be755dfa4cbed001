use crate::config::StorageConfig;
use crate::credentials::StorageCredentials;
use crate::error::UploadError;
use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_s3::primitives::ByteStream;
use std::path::Path;
use tracing::{debug, info};

/// Remote object storage for evidence photos
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn upload(&self, local_path: &Path, key: &str) -> Result<(), UploadError>;
}

/// S3 bucket upload. Without credentials every upload fails fast with
/// [`UploadError::MissingCredentials`] and no request is made.
pub struct S3ObjectStore {
    client: Option<aws_sdk_s3::Client>,
    bucket: String,
}

impl S3ObjectStore {
    pub fn new(config: &StorageConfig, credentials: Option<&StorageCredentials>) -> Self {
        let client = credentials.map(|creds| {
            let provider = Credentials::new(
                creds.key_id.clone(),
                creds.secret.clone(),
                None,
                None,
                "doorbell-config",
            );
            let s3_config = aws_sdk_s3::Config::builder()
                .behavior_version(BehaviorVersion::latest())
                .region(Region::new(config.region.clone()))
                .credentials_provider(provider)
                .build();
            aws_sdk_s3::Client::from_conf(s3_config)
        });

        if client.is_some() {
            info!("S3 evidence store ready for bucket '{}'", config.bucket);
        }

        Self {
            client,
            bucket: config.bucket.clone(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn upload(&self, local_path: &Path, key: &str) -> Result<(), UploadError> {
        let client = self.client.as_ref().ok_or(UploadError::MissingCredentials)?;

        if !local_path.exists() {
            return Err(UploadError::NotFound(local_path.to_path_buf()));
        }

        let body = ByteStream::from_path(local_path)
            .await
            .map_err(|e| UploadError::Transport(e.to_string()))?;

        debug!("Uploading {} to s3://{}/{}", local_path.display(), self.bucket, key);

        client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type("image/jpeg")
            .body(body)
            .send()
            .await
            .map_err(|e| {
                let code = e.as_service_error().and_then(|se| se.code()).unwrap_or_default();
                if is_auth_code(code) {
                    UploadError::AuthFailure(code.to_string())
                } else {
                    UploadError::Transport(DisplayErrorContext(&e).to_string())
                }
            })?;

        Ok(())
    }
}

fn is_auth_code(code: &str) -> bool {
    matches!(
        code,
        "InvalidAccessKeyId"
            | "SignatureDoesNotMatch"
            | "AccessDenied"
            | "ExpiredToken"
            | "InvalidToken"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DoorbellConfig;

    #[tokio::test]
    async fn test_upload_without_credentials_fails_fast() {
        let config = DoorbellConfig::default().storage;
        let store = S3ObjectStore::new(&config, None);

        let result = store.upload(Path::new("/tmp/any.jpg"), "any.jpg").await;
        assert!(matches!(result, Err(UploadError::MissingCredentials)));
        assert_eq!(store.bucket(), "newtestonlyjpg");
    }

    #[tokio::test]
    async fn test_missing_local_file_reported() {
        let config = DoorbellConfig::default().storage;
        let credentials = StorageCredentials {
            key_id: "AKIATEST".to_string(),
            secret: "secret".to_string(),
        };
        let store = S3ObjectStore::new(&config, Some(&credentials));
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone.jpg");

        let result = store.upload(&missing, "gone.jpg").await;
        assert!(matches!(result, Err(UploadError::NotFound(path)) if path == missing));
    }

    #[test]
    fn test_auth_codes() {
        assert!(is_auth_code("InvalidAccessKeyId"));
        assert!(is_auth_code("AccessDenied"));
        assert!(!is_auth_code("NoSuchBucket"));
        assert!(!is_auth_code(""));
    }
}
