//! Media module
//!
//! Upload kinds, declared media type validation, random key tokens, and the
//! external tooling (fast-start rewrite and stream probing) used by the video
//! pipeline.

use thiserror::Error;

pub mod ffmpeg;
pub mod processor;
pub mod token;

pub use ffmpeg::FfmpegProcessor;
pub use processor::{Dimensions, MediaProcessor, Orientation};

/// Media errors
#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("Entropy source error: {0}")]
    EntropySource(String),

    #[error("{tool} could not be started: {source}")]
    ToolNotFound {
        tool: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} exited with status {exit_code:?}: {stderr}")]
    ToolFailed {
        tool: &'static str,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("Failed to parse probe output: {0}")]
    ProbeParse(String),

    #[error("No video stream found")]
    NoVideoStream,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// The two kinds of upload the service accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UploadKind {
    Thumbnail,
    Video,
}

const THUMBNAIL_TYPES: &[&str] = &["image/jpeg", "image/png"];
const VIDEO_TYPES: &[&str] = &["video/mp4"];

impl UploadKind {
    /// Label used in logs, metrics, and temp file names
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadKind::Thumbnail => "thumbnail",
            UploadKind::Video => "video",
        }
    }

    /// Name of the multipart form field carrying the upload
    pub fn form_field(&self) -> &'static str {
        self.as_str()
    }

    /// Media types accepted for this kind
    pub fn allowed_media_types(&self) -> &'static [&'static str] {
        match self {
            UploadKind::Thumbnail => THUMBNAIL_TYPES,
            UploadKind::Video => VIDEO_TYPES,
        }
    }

    /// Number of random bytes in the storage key token
    pub fn token_bytes(&self) -> usize {
        match self {
            UploadKind::Thumbnail => 4,
            UploadKind::Video => 16,
        }
    }
}

impl std::fmt::Display for UploadKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A declared media type that passed the allow-list for its upload kind
///
/// Parameters (`; charset=...`, `; codecs=...`) are discarded.
///
/// # Example
///
/// ```
/// use tsukumo::media::{MediaType, UploadKind};
///
/// let media_type = MediaType::parse_for(UploadKind::Thumbnail, Some("image/png; q=1")).unwrap();
/// assert_eq!(media_type.as_str(), "image/png");
/// assert_eq!(media_type.extension(), "png");
///
/// assert!(MediaType::parse_for(UploadKind::Video, Some("image/png")).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaType {
    essence: String,
    subtype_at: usize,
}

impl MediaType {
    /// Parse `declared` and check it against the allow-list for `kind`
    pub fn parse_for(kind: UploadKind, declared: Option<&str>) -> Result<Self, MediaError> {
        let declared = declared
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| MediaError::UnsupportedMediaType("missing content type".into()))?;

        let parsed: mime::Mime = declared
            .parse()
            .map_err(|_| MediaError::UnsupportedMediaType(declared.to_string()))?;

        let essence = parsed.essence_str().to_ascii_lowercase();
        if !kind.allowed_media_types().contains(&essence.as_str()) {
            return Err(MediaError::UnsupportedMediaType(essence));
        }

        let subtype_at = parsed.type_().as_str().len() + 1;
        Ok(Self {
            essence,
            subtype_at,
        })
    }

    /// `type/subtype` without parameters
    pub fn as_str(&self) -> &str {
        &self.essence
    }

    /// File extension for storage keys (the subtype)
    pub fn extension(&self) -> &str {
        &self.essence[self.subtype_at..]
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.essence)
    }
}
