//! Media processor seam
//!
//! The pipeline only needs two things from a media toolkit: a fast-start
//! rewrite and the dimensions of the first video stream. Keeping them behind
//! [`MediaProcessor`] lets tests swap in a fake and keeps `ffmpeg` out of the
//! pipeline's control flow.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::MediaError;

/// Width and height of a video stream, in pixels
///
/// Zero means the probe did not report the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Orientation bucket derived from a probed aspect ratio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// 16:9
    Landscape,
    /// 9:16
    Portrait,
    /// Anything else, including square and unknown dimensions
    Other,
}

// Ratios in hundredths after rounding: 16/9 = 1.78, 9/16 = 0.56
const LANDSCAPE_RATIO: i64 = 178;
const PORTRAIT_RATIO: i64 = 56;

impl Orientation {
    /// Classify dimensions by their ratio rounded to two decimal places
    ///
    /// # Example
    ///
    /// ```
    /// use tsukumo::media::{Dimensions, Orientation};
    ///
    /// assert_eq!(Orientation::classify(Dimensions::new(1920, 1080)), Orientation::Landscape);
    /// assert_eq!(Orientation::classify(Dimensions::new(1080, 1920)), Orientation::Portrait);
    /// assert_eq!(Orientation::classify(Dimensions::new(1000, 1000)), Orientation::Other);
    /// ```
    pub fn classify(dimensions: Dimensions) -> Self {
        if dimensions.width == 0 || dimensions.height == 0 {
            return Orientation::Other;
        }

        let ratio = (dimensions.width as f64 / dimensions.height as f64 * 100.0).round() as i64;
        match ratio {
            LANDSCAPE_RATIO => Orientation::Landscape,
            PORTRAIT_RATIO => Orientation::Portrait,
            _ => Orientation::Other,
        }
    }

    /// Storage key prefix; empty for [`Orientation::Other`]
    pub fn prefix(&self) -> &'static str {
        match self {
            Orientation::Landscape => "landscape",
            Orientation::Portrait => "portrait",
            Orientation::Other => "",
        }
    }
}

/// Fast-start rewrite and stream probing
#[async_trait]
pub trait MediaProcessor: Send + Sync {
    /// Rewrite `input` so its index precedes the media payload
    ///
    /// Returns the path of a new file, normally [`processing_path`] of the
    /// input. The caller owns both files and must remove them; it owns the
    /// conventional output path from before this call starts.
    async fn fast_start(&self, input: &Path) -> Result<PathBuf, MediaError>;

    /// Dimensions of the first video stream in `path`
    async fn probe(&self, path: &Path) -> Result<Dimensions, MediaError>;
}

/// Output path convention for a fast-start rewrite: `<input>.processing`
pub fn processing_path(input: &Path) -> PathBuf {
    let mut path = input.as_os_str().to_owned();
    path.push(".processing");
    PathBuf::from(path)
}
