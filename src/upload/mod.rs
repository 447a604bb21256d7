//! Upload module
//!
//! The thumbnail and video pipelines, the staged temp files they work from,
//! and the one place where every failure is mapped to an HTTP status.

use hyper::StatusCode;
use thiserror::Error;
use uuid::Uuid;

use crate::auth::AuthError;
use crate::db::StoreError;
use crate::media::{MediaError, UploadKind};
use crate::storage::StorageError;

pub mod key;
pub mod pipeline;
pub mod temp_file;

pub use pipeline::UploadPipeline;
pub use temp_file::{StagedFile, StagingError};

/// Upload errors
///
/// Every stage error folds into one of these; [`UploadError::status_code`]
/// is the single mapping from failure class to response status.
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(#[from] AuthError),

    #[error("User does not own video {0}")]
    Forbidden(Uuid),

    #[error("Video not found: {0}")]
    VideoNotFound(Uuid),

    #[error("Upload exceeds {limit} bytes")]
    PayloadTooLarge { limit: u64 },

    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("Staging error: {0}")]
    Staging(#[source] std::io::Error),

    #[error("Media processing error: {0}")]
    Media(#[source] MediaError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Record store error: {0}")]
    Store(#[source] StoreError),
}

impl UploadError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            UploadError::BadRequest(_) => StatusCode::BAD_REQUEST,
            UploadError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            UploadError::Forbidden(_) => StatusCode::FORBIDDEN,
            UploadError::VideoNotFound(_) => StatusCode::NOT_FOUND,
            UploadError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            UploadError::UnsupportedMediaType(_) => StatusCode::UNPROCESSABLE_ENTITY,
            UploadError::Staging(_)
            | UploadError::Media(_)
            | UploadError::Storage(_)
            | UploadError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to return to the client
    ///
    /// Server-side failures get a fixed message; the cause is only logged.
    pub fn public_message(&self) -> String {
        match self {
            UploadError::BadRequest(msg) => msg.clone(),
            UploadError::Unauthorized(_) => "Couldn't validate credentials".into(),
            UploadError::Forbidden(_) => "You do not own this video".into(),
            UploadError::VideoNotFound(_) => "Video not found".into(),
            UploadError::PayloadTooLarge { limit } => {
                format!("Upload exceeds the {} byte limit", limit)
            }
            UploadError::UnsupportedMediaType(media_type) => {
                format!("Unsupported media type: {}", media_type)
            }
            UploadError::Staging(_) => "Failed to stage upload".into(),
            UploadError::Media(MediaError::EntropySource(_)) => {
                "Failed to generate storage key".into()
            }
            UploadError::Media(_) => "Failed to process video".into(),
            UploadError::Storage(_) => "Failed to store upload".into(),
            UploadError::Store(_) => "Failed to update video".into(),
        }
    }

    /// Metrics label
    pub fn kind(&self) -> &'static str {
        match self {
            UploadError::BadRequest(_) => "bad_request",
            UploadError::Unauthorized(_) => "unauthorized",
            UploadError::Forbidden(_) => "forbidden",
            UploadError::VideoNotFound(_) => "not_found",
            UploadError::PayloadTooLarge { .. } => "payload_too_large",
            UploadError::UnsupportedMediaType(_) => "unsupported_media_type",
            UploadError::Staging(_) => "staging",
            UploadError::Media(MediaError::EntropySource(_)) => "entropy",
            UploadError::Media(_) => "media",
            UploadError::Storage(_) => "storage",
            UploadError::Store(_) => "store",
        }
    }
}

impl From<StagingError> for UploadError {
    fn from(e: StagingError) -> Self {
        match e {
            StagingError::Io(io) => UploadError::Staging(io),
            StagingError::TooLarge { limit } => UploadError::PayloadTooLarge { limit },
            StagingError::Body(msg) => UploadError::BadRequest(msg),
        }
    }
}

impl From<MediaError> for UploadError {
    fn from(e: MediaError) -> Self {
        match e {
            MediaError::UnsupportedMediaType(media_type) => {
                UploadError::UnsupportedMediaType(media_type)
            }
            other => UploadError::Media(other),
        }
    }
}

impl From<StoreError> for UploadError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => UploadError::VideoNotFound(id),
            other => UploadError::Store(other),
        }
    }
}

/// Body-size ceilings per upload kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadLimits {
    pub max_thumbnail_bytes: u64,
    pub max_video_bytes: u64,
}

impl UploadLimits {
    pub fn for_kind(&self, kind: UploadKind) -> u64 {
        match kind {
            UploadKind::Thumbnail => self.max_thumbnail_bytes,
            UploadKind::Video => self.max_video_bytes,
        }
    }
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_thumbnail_bytes: crate::config::DEFAULT_MAX_THUMBNAIL_BYTES,
            max_video_bytes: crate::config::DEFAULT_MAX_VIDEO_BYTES,
        }
    }
}

/// An upload as it arrives: declared content type plus a byte stream
pub struct IncomingUpload<S> {
    pub content_type: Option<String>,
    pub body: S,
}

impl<S> IncomingUpload<S> {
    pub fn new(content_type: Option<String>, body: S) -> Self {
        Self { content_type, body }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let id = Uuid::new_v4();
        let cases: Vec<(UploadError, StatusCode)> = vec![
            (UploadError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (AuthError::MissingAuth.into(), StatusCode::UNAUTHORIZED),
            (UploadError::Forbidden(id), StatusCode::FORBIDDEN),
            (StoreError::NotFound(id).into(), StatusCode::NOT_FOUND),
            (
                StagingError::TooLarge { limit: 10 }.into(),
                StatusCode::PAYLOAD_TOO_LARGE,
            ),
            (
                MediaError::UnsupportedMediaType("image/gif".into()).into(),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                StagingError::Io(std::io::Error::other("disk full")).into(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                MediaError::NoVideoStream.into(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                StorageError::ObjectStore("503".into()).into(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                StoreError::Backend("locked".into()).into(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, status) in cases {
            assert_eq!(error.status_code(), status, "{:?}", error);
        }
    }

    #[test]
    fn test_public_message_hides_internals() {
        let error: UploadError = MediaError::ToolFailed {
            tool: "ffmpeg",
            exit_code: Some(1),
            stderr: "/tmp/tsukumo-video-1234.tmp: Invalid data".into(),
        }
        .into();
        assert_eq!(error.public_message(), "Failed to process video");

        let error: UploadError = StagingError::Io(std::io::Error::other("/var/tmp")).into();
        assert!(!error.public_message().contains("/var/tmp"));
    }

    #[test]
    fn test_limits_for_kind() {
        let limits = UploadLimits::default();
        assert_eq!(limits.for_kind(UploadKind::Video), 1 << 30);
        assert_eq!(limits.for_kind(UploadKind::Thumbnail), 10 << 20);
    }
}
