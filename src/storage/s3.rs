//! S3 object storage for videos
//!
//! Single-request `PutObject` uploads streamed from the staged file. Works
//! against AWS or any S3-compatible endpoint (MinIO, LocalStack) when
//! `s3.endpoint` is set, in which case path-style addressing is used.

use async_trait::async_trait;
use aws_config::retry::RetryConfig;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use std::time::Instant;

use super::{MediaStorage, StorageError, StoredObject};
use crate::config::S3Config;
use crate::media::MediaType;
use crate::upload::key::ObjectKey;
use crate::upload::temp_file::StagedFile;

/// S3-backed [`MediaStorage`]
#[derive(Clone)]
pub struct S3Storage {
    client: Client,
    bucket: String,
    region: String,
    endpoint: Option<String>,
}

impl S3Storage {
    /// Build a client from configuration
    ///
    /// Static credentials from the config take precedence over the default
    /// AWS provider chain. The SDK's own retries are disabled; a failed PUT
    /// fails the request.
    pub async fn from_config(config: &S3Config) -> Result<Self, StorageError> {
        if config.bucket.is_empty() {
            return Err(StorageError::Config("bucket must not be empty".into()));
        }

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .retry_config(RetryConfig::disabled());

        match (&config.access_key, &config.secret_key) {
            (Some(access_key), Some(secret_key)) => {
                loader = loader.credentials_provider(Credentials::new(
                    access_key,
                    secret_key,
                    None,
                    None,
                    "tsukumo-config",
                ));
            }
            (None, None) => {}
            _ => {
                return Err(StorageError::Config(
                    "access_key and secret_key must be set together".into(),
                ))
            }
        }

        let shared = loader.load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        tracing::info!(
            bucket = %config.bucket,
            region = %config.region,
            endpoint = config.endpoint.as_deref().unwrap_or("aws"),
            "S3 storage configured"
        );

        Ok(Self {
            client: Client::from_conf(builder.build()),
            bucket: config.bucket.clone(),
            region: config.region.clone(),
            endpoint: config
                .endpoint
                .as_ref()
                .map(|e| e.trim_end_matches('/').to_string()),
        })
    }
}

impl std::fmt::Debug for S3Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Storage")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl MediaStorage for S3Storage {
    #[tracing::instrument(
        name = "storage.s3.store",
        skip_all,
        fields(bucket = %self.bucket, key = %key, content_type = %media_type, bytes = staged.size()),
        err
    )]
    async fn store(
        &self,
        key: &ObjectKey,
        media_type: &MediaType,
        staged: &mut StagedFile,
    ) -> Result<StoredObject, StorageError> {
        let size = staged.size();
        let body = ByteStream::from_path(staged.path())
            .await
            .map_err(|e| StorageError::ObjectStore(e.to_string()))?;

        let start = Instant::now();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key.as_str())
            .body(body)
            .content_type(media_type.as_str())
            .content_length(size as i64)
            .send()
            .await
            .map_err(|e| StorageError::ObjectStore(DisplayErrorContext(&e).to_string()))?;

        tracing::info!(
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );

        Ok(StoredObject {
            key: key.to_string(),
            url: self.url_for(key),
            bytes_written: size,
        })
    }

    fn url_for(&self, key: &ObjectKey) -> String {
        match &self.endpoint {
            Some(endpoint) => format!("{}/{}/{}", endpoint, self.bucket, key),
            None => format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                self.bucket, self.region, key
            ),
        }
    }
}
