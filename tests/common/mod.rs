//! Shared test fixtures
//!
//! - A media processor that fakes ffmpeg/ffprobe with a fixed probe result
//! - An in-memory video storage that records every PUT
//! - JWT minting and pipeline assembly over temp directories

#![allow(dead_code)]

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::io::AsyncReadExt;
use tsukumo::db::{MemoryVideoStore, Video, VideoStore};
use tsukumo::media::processor::processing_path;
use tsukumo::media::{Dimensions, MediaError, MediaProcessor, MediaType};
use tsukumo::storage::{LocalStorage, MediaStorage, StorageError, StoredObject};
use tsukumo::upload::key::ObjectKey;
use tsukumo::upload::{StagedFile, UploadLimits, UploadPipeline};
use uuid::Uuid;

/// JWT secret for test tokens
pub const JWT_SECRET: &str = "tsukumo-test-secret";

/// Public origin for thumbnails in tests
pub const ASSETS_BASE_URL: &str = "http://localhost:8091";

/// Fast-start copies the input; probe reports fixed dimensions
pub struct FakeProcessor {
    dimensions: Dimensions,
}

impl FakeProcessor {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            dimensions: Dimensions::new(width, height),
        }
    }
}

#[async_trait]
impl MediaProcessor for FakeProcessor {
    async fn fast_start(&self, input: &Path) -> Result<PathBuf, MediaError> {
        let output = processing_path(input);
        tokio::fs::copy(input, &output).await?;
        Ok(output)
    }

    async fn probe(&self, _path: &Path) -> Result<Dimensions, MediaError> {
        Ok(self.dimensions)
    }
}

/// A recorded PUT
#[derive(Debug, Clone)]
pub struct RecordedObject {
    pub key: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

/// Video storage that keeps objects in memory
#[derive(Default)]
pub struct RecordingStorage {
    objects: Mutex<Vec<RecordedObject>>,
    fail: bool,
}

impl RecordingStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// A storage whose every PUT fails
    pub fn failing() -> Self {
        Self {
            objects: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn objects(&self) -> Vec<RecordedObject> {
        self.objects.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaStorage for RecordingStorage {
    async fn store(
        &self,
        key: &ObjectKey,
        media_type: &MediaType,
        staged: &mut StagedFile,
    ) -> Result<StoredObject, StorageError> {
        if self.fail {
            return Err(StorageError::ObjectStore("503 Slow Down".into()));
        }

        let mut content = Vec::new();
        staged.reader().await?.read_to_end(&mut content).await?;
        let bytes_written = content.len() as u64;

        self.objects.lock().unwrap().push(RecordedObject {
            key: key.to_string(),
            content_type: media_type.to_string(),
            content,
        });

        Ok(StoredObject {
            key: key.to_string(),
            url: self.url_for(key),
            bytes_written,
        })
    }

    fn url_for(&self, key: &ObjectKey) -> String {
        format!("https://test-bucket.s3.us-east-1.amazonaws.com/{}", key)
    }
}

/// Pipeline over temp directories with an in-memory record store
pub struct TestEnv {
    pub dir: TempDir,
    pub store: Arc<MemoryVideoStore>,
    pub videos: Arc<RecordingStorage>,
    pub pipeline: UploadPipeline,
}

impl TestEnv {
    pub fn new(processor: Arc<dyn MediaProcessor>) -> Self {
        Self::build(processor, Arc::new(RecordingStorage::new()), UploadLimits::default())
    }

    pub fn build(
        processor: Arc<dyn MediaProcessor>,
        videos: Arc<RecordingStorage>,
        limits: UploadLimits,
    ) -> Self {
        Self::build_with_store(processor, videos, limits, |store| {
            store as Arc<dyn VideoStore>
        })
    }

    /// Like [`TestEnv::build`], with the pipeline's store wrapped by `wrap`
    ///
    /// `store` still points at the underlying records.
    pub fn build_with_store<F>(
        processor: Arc<dyn MediaProcessor>,
        videos: Arc<RecordingStorage>,
        limits: UploadLimits,
        wrap: F,
    ) -> Self
    where
        F: FnOnce(Arc<MemoryVideoStore>) -> Arc<dyn VideoStore>,
    {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("staging")).unwrap();

        let store = Arc::new(MemoryVideoStore::new());
        let thumbnails = Arc::new(LocalStorage::new(
            dir.path().join("assets"),
            ASSETS_BASE_URL,
        ));
        let pipeline = UploadPipeline::new(
            wrap(store.clone()),
            processor,
            thumbnails,
            videos.clone(),
            limits,
            dir.path().join("staging"),
        );

        Self {
            dir,
            store,
            videos,
            pipeline,
        }
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.dir.path().join("staging")
    }

    pub fn assets_root(&self) -> PathBuf {
        self.dir.path().join("assets")
    }

    /// Number of files left in the staging directory
    pub fn staged_files(&self) -> usize {
        std::fs::read_dir(self.staging_dir()).unwrap().count()
    }

    /// Create a video owned by a fresh user
    pub async fn seed_video(&self) -> Video {
        let video = Video::new(Uuid::new_v4(), "Boots demo");
        self.store.create_video(&video).await.unwrap();
        video
    }
}

/// Upload body as produced by [`body`]
pub type BodyStream =
    futures::stream::Iter<std::vec::IntoIter<Result<bytes::Bytes, std::io::Error>>>;

/// Single-chunk body stream
pub fn body(content: &[u8]) -> BodyStream {
    futures::stream::iter(vec![Ok(bytes::Bytes::copy_from_slice(content))])
}

/// Sign an HS256 token for `user_id`
pub fn mint_token(secret: &str, user_id: Uuid, expires_in_secs: i64) -> String {
    use jsonwebtoken::{encode, EncodingKey, Header};
    use tsukumo::auth::jwt::Claims;

    let claims = Claims {
        sub: user_id.to_string(),
        exp: (chrono::Utc::now().timestamp() + expires_in_secs) as usize,
        iat: Some(chrono::Utc::now().timestamp() as usize),
        iss: None,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

/// Fake PNG payload: signature followed by filler
pub fn png_bytes(len: usize) -> Vec<u8> {
    let mut content = vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];
    content.extend((0..len.saturating_sub(8)).map(|i| (i % 251) as u8));
    content
}
