//! Upload pipelines
//!
//! ```text
//! Received -> Authorized -> Validated -> Staged -> [Transformed -> Probed] -> Keyed -> Stored -> Persisted
//! ```
//!
//! Any stage failure returns immediately. The record is written back once,
//! after storage succeeds, and every staged file is removed when its
//! [`StagedFile`] handle goes out of scope.

use bytes::Bytes;
use chrono::Utc;
use futures::Stream;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use super::key::ObjectKey;
use super::temp_file::{StagedFile, StagingError};
use super::{IncomingUpload, UploadError, UploadLimits};
use crate::auth::Principal;
use crate::db::{Video, VideoStore};
use crate::media::processor::processing_path;
use crate::media::{token, MediaProcessor, MediaType, Orientation, UploadKind};
use crate::metrics;
use crate::storage::MediaStorage;

/// Sequences the upload stages against the configured collaborators
#[derive(Clone)]
pub struct UploadPipeline {
    store: Arc<dyn VideoStore>,
    processor: Arc<dyn MediaProcessor>,
    thumbnails: Arc<dyn MediaStorage>,
    videos: Arc<dyn MediaStorage>,
    limits: UploadLimits,
    staging_dir: PathBuf,
}

impl UploadPipeline {
    pub fn new(
        store: Arc<dyn VideoStore>,
        processor: Arc<dyn MediaProcessor>,
        thumbnails: Arc<dyn MediaStorage>,
        videos: Arc<dyn MediaStorage>,
        limits: UploadLimits,
        staging_dir: PathBuf,
    ) -> Self {
        Self {
            store,
            processor,
            thumbnails,
            videos,
            limits,
            staging_dir,
        }
    }

    pub fn limits(&self) -> UploadLimits {
        self.limits
    }

    /// Load the video and check the caller owns it
    pub async fn authorize(
        &self,
        video_id: Uuid,
        principal: &Principal,
    ) -> Result<Video, UploadError> {
        let video = self.store.get_video(video_id).await?;
        if video.user_id != principal.user_id {
            tracing::warn!(
                video_id = %video_id,
                user_id = %principal.user_id,
                "Upload rejected: caller does not own video"
            );
            return Err(UploadError::Forbidden(video_id));
        }

        tracing::debug!(video_id = %video_id, "Authorized");
        Ok(video)
    }

    /// Reject a body whose declared length is already over the ceiling
    pub fn admit(&self, kind: UploadKind, declared_len: Option<u64>) -> Result<(), UploadError> {
        let limit = self.limits.for_kind(kind);
        match declared_len {
            Some(len) if len > limit => Err(UploadError::PayloadTooLarge { limit }),
            _ => Ok(()),
        }
    }

    /// Stage, store locally, and record a thumbnail
    #[tracing::instrument(name = "upload.thumbnail", skip_all, fields(video_id = %video.id), err)]
    pub async fn upload_thumbnail<S, E>(
        &self,
        video: Video,
        upload: IncomingUpload<S>,
    ) -> Result<Video, UploadError>
    where
        S: Stream<Item = Result<Bytes, E>> + Send,
        E: Into<StagingError>,
    {
        let start = Instant::now();
        let result = self.process_thumbnail(video, upload).await;
        observe(UploadKind::Thumbnail, start, &result);
        result.map(|(video, _)| video)
    }

    /// Stage, fast-start, probe, upload, and record a video
    #[tracing::instrument(name = "upload.video", skip_all, fields(video_id = %video.id), err)]
    pub async fn upload_video<S, E>(
        &self,
        video: Video,
        upload: IncomingUpload<S>,
    ) -> Result<Video, UploadError>
    where
        S: Stream<Item = Result<Bytes, E>> + Send,
        E: Into<StagingError>,
    {
        let start = Instant::now();
        let result = self.process_video(video, upload).await;
        observe(UploadKind::Video, start, &result);
        result.map(|(video, _)| video)
    }

    async fn process_thumbnail<S, E>(
        &self,
        mut video: Video,
        upload: IncomingUpload<S>,
    ) -> Result<(Video, u64), UploadError>
    where
        S: Stream<Item = Result<Bytes, E>> + Send,
        E: Into<StagingError>,
    {
        let kind = UploadKind::Thumbnail;
        let media_type = MediaType::parse_for(kind, upload.content_type.as_deref())?;
        tracing::debug!(video_id = %video.id, media_type = %media_type, "Validated");

        let mut staged = self.stage(kind, upload.body).await?;
        tracing::debug!(video_id = %video.id, bytes = staged.size(), "Staged");

        let key = ObjectKey::thumbnail(&token::url_safe_token(kind.token_bytes())?, &media_type);
        tracing::debug!(video_id = %video.id, key = %key, "Keyed");

        let stored = self.thumbnails.store(&key, &media_type, &mut staged).await?;
        tracing::debug!(video_id = %video.id, url = %stored.url, "Stored");

        video.thumbnail_url = Some(stored.url);
        self.persist(&mut video).await?;
        Ok((video, stored.bytes_written))
    }

    async fn process_video<S, E>(
        &self,
        mut video: Video,
        upload: IncomingUpload<S>,
    ) -> Result<(Video, u64), UploadError>
    where
        S: Stream<Item = Result<Bytes, E>> + Send,
        E: Into<StagingError>,
    {
        let kind = UploadKind::Video;
        let media_type = MediaType::parse_for(kind, upload.content_type.as_deref())?;
        tracing::debug!(video_id = %video.id, media_type = %media_type, "Validated");

        let original = self.stage(kind, upload.body).await?;
        tracing::debug!(video_id = %video.id, bytes = original.size(), "Staged");

        // Removed on drop even if the transform is cancelled mid-write
        let reserved = StagedFile::reserve(processing_path(original.path()));
        let output = self.processor.fast_start(original.path()).await?;
        let mut processed = if output == reserved.path() {
            reserved.open().await?
        } else {
            StagedFile::adopt(output).await?
        };
        tracing::debug!(video_id = %video.id, bytes = processed.size(), "Transformed");

        let dimensions = self.processor.probe(processed.path()).await?;
        let orientation = Orientation::classify(dimensions);
        tracing::debug!(
            video_id = %video.id,
            width = dimensions.width,
            height = dimensions.height,
            orientation = orientation.prefix(),
            "Probed"
        );

        let key = ObjectKey::video(orientation, &token::hex_token(kind.token_bytes())?);
        tracing::debug!(video_id = %video.id, key = %key, "Keyed");

        let stored = self.videos.store(&key, &media_type, &mut processed).await?;
        tracing::debug!(video_id = %video.id, url = %stored.url, "Stored");

        video.video_url = Some(stored.url);
        self.persist(&mut video).await?;
        Ok((video, stored.bytes_written))
    }

    async fn stage<S, E>(&self, kind: UploadKind, body: S) -> Result<StagedFile, UploadError>
    where
        S: Stream<Item = Result<Bytes, E>> + Send,
        E: Into<StagingError>,
    {
        let limit = self.limits.for_kind(kind);
        Ok(StagedFile::from_stream(&self.staging_dir, kind.as_str(), body, limit).await?)
    }

    async fn persist(&self, video: &mut Video) -> Result<(), UploadError> {
        video.updated_at = Utc::now();
        self.store.update_video(video).await?;
        tracing::debug!(video_id = %video.id, "Persisted");
        Ok(())
    }
}

fn observe(kind: UploadKind, start: Instant, result: &Result<(Video, u64), UploadError>) {
    metrics::record_upload_duration(kind.as_str(), start.elapsed().as_secs_f64());
    match result {
        Ok((video, bytes)) => {
            metrics::record_upload_success(kind.as_str(), *bytes);
            tracing::info!(
                video_id = %video.id,
                kind = kind.as_str(),
                bytes,
                "Upload complete"
            );
        }
        Err(e) => {
            metrics::record_upload_failure(kind.as_str());
            if e.status_code().is_server_error() {
                tracing::error!(kind = kind.as_str(), error = %e, "Upload failed");
            } else {
                tracing::warn!(kind = kind.as_str(), error = %e, "Upload rejected");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryVideoStore;
    use crate::media::{Dimensions, MediaError};
    use crate::storage::LocalStorage;
    use async_trait::async_trait;
    use std::path::Path;

    struct NoopProcessor;

    #[async_trait]
    impl MediaProcessor for NoopProcessor {
        async fn fast_start(&self, _input: &Path) -> Result<PathBuf, MediaError> {
            Err(MediaError::NoVideoStream)
        }

        async fn probe(&self, _path: &Path) -> Result<Dimensions, MediaError> {
            Err(MediaError::NoVideoStream)
        }
    }

    fn pipeline(store: Arc<MemoryVideoStore>, dir: &Path) -> UploadPipeline {
        let local = Arc::new(LocalStorage::new(dir.join("assets"), "http://localhost:8091"));
        UploadPipeline::new(
            store,
            Arc::new(NoopProcessor),
            local.clone(),
            local,
            UploadLimits {
                max_thumbnail_bytes: 64,
                max_video_bytes: 128,
            },
            dir.to_path_buf(),
        )
    }

    #[test]
    fn test_admit() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(Arc::new(MemoryVideoStore::new()), dir.path());

        assert!(pipeline.admit(UploadKind::Video, None).is_ok());
        assert!(pipeline.admit(UploadKind::Video, Some(128)).is_ok());
        assert!(matches!(
            pipeline.admit(UploadKind::Video, Some(129)),
            Err(UploadError::PayloadTooLarge { limit: 128 })
        ));
        assert!(matches!(
            pipeline.admit(UploadKind::Thumbnail, Some(65)),
            Err(UploadError::PayloadTooLarge { limit: 64 })
        ));
    }

    #[tokio::test]
    async fn test_authorize() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryVideoStore::new());
        let owner = Principal {
            user_id: Uuid::new_v4(),
        };
        let video = Video::new(owner.user_id, "mine");
        store.create_video(&video).await.unwrap();
        let pipeline = pipeline(store, dir.path());

        assert_eq!(pipeline.authorize(video.id, &owner).await.unwrap(), video);

        let stranger = Principal {
            user_id: Uuid::new_v4(),
        };
        assert!(matches!(
            pipeline.authorize(video.id, &stranger).await,
            Err(UploadError::Forbidden(id)) if id == video.id
        ));

        assert!(matches!(
            pipeline.authorize(Uuid::new_v4(), &owner).await,
            Err(UploadError::VideoNotFound(_))
        ));
    }
}
