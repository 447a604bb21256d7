//! Storage backends
//!
//! Both backends answer the same question: persist these bytes at this key
//! and tell me where they can be fetched from.
//!
//! | Backend | Used for | URL |
//! |---------|----------|-----|
//! | [`LocalStorage`] | thumbnails | `{base_url}/assets/{key}` |
//! | [`S3Storage`] | videos | `https://{bucket}.s3.{region}.amazonaws.com/{key}` |

use async_trait::async_trait;
use thiserror::Error;

use crate::media::MediaType;
use crate::upload::key::ObjectKey;
use crate::upload::temp_file::{StagedFile, StagingError};

pub mod local;
pub mod s3;

pub use local::LocalStorage;
pub use s3::S3Storage;

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Object store error: {0}")]
    ObjectStore(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<StagingError> for StorageError {
    fn from(e: StagingError) -> Self {
        match e {
            StagingError::Io(io) => StorageError::Io(io),
            other => StorageError::ObjectStore(other.to_string()),
        }
    }
}

/// A persisted object
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub key: String,
    pub url: String,
    pub bytes_written: u64,
}

/// Durable storage addressed by key
#[async_trait]
pub trait MediaStorage: Send + Sync {
    /// Persist the staged content under `key`
    async fn store(
        &self,
        key: &ObjectKey,
        media_type: &MediaType,
        staged: &mut StagedFile,
    ) -> Result<StoredObject, StorageError>;

    /// Public URL for `key`
    fn url_for(&self, key: &ObjectKey) -> String;
}
