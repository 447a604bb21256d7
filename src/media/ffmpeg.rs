//! ffmpeg / ffprobe backed [`MediaProcessor`]

use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Instant;
use tokio::process::Command;

use super::processor::processing_path;
use super::{Dimensions, MediaError, MediaProcessor};
use crate::config::MediaConfig;
use crate::metrics;

/// Top-level `ffprobe -print_format json -show_streams` output
#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

/// Runs the `ffmpeg` and `ffprobe` binaries as child processes
#[derive(Debug, Clone)]
pub struct FfmpegProcessor {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl FfmpegProcessor {
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    pub fn from_config(config: &MediaConfig) -> Self {
        Self::new(&config.ffmpeg_path, &config.ffprobe_path)
    }

    async fn run(tool: &'static str, command: &mut Command) -> Result<Output, MediaError> {
        let start = Instant::now();
        let output = command
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| MediaError::ToolNotFound { tool, source })?;
        metrics::record_tool_duration(tool, start.elapsed().as_secs_f64());

        if !output.status.success() {
            return Err(MediaError::ToolFailed {
                tool,
                exit_code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output)
    }
}

#[async_trait]
impl MediaProcessor for FfmpegProcessor {
    #[tracing::instrument(name = "media.fast_start", skip_all, fields(input = %input.display()), err)]
    async fn fast_start(&self, input: &Path) -> Result<PathBuf, MediaError> {
        let output_path = processing_path(input);

        let mut command = Command::new(&self.ffmpeg);
        command
            .args(["-y", "-loglevel", "error", "-i"])
            .arg(input)
            .args(["-c", "copy", "-movflags", "faststart", "-f", "mp4"])
            .arg(&output_path);

        if let Err(e) = Self::run("ffmpeg", &mut command).await {
            // ffmpeg may leave a partial output behind
            if let Err(remove_err) = tokio::fs::remove_file(&output_path).await {
                if remove_err.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(
                        path = %output_path.display(),
                        error = %remove_err,
                        "Failed to remove partial fast-start output"
                    );
                }
            }
            return Err(e);
        }

        Ok(output_path)
    }

    #[tracing::instrument(name = "media.probe", skip_all, fields(path = %path.display()), err)]
    async fn probe(&self, path: &Path) -> Result<Dimensions, MediaError> {
        let mut command = Command::new(&self.ffprobe);
        command
            .args(["-v", "error", "-print_format", "json", "-show_streams"])
            .arg(path);

        let output = Self::run("ffprobe", &mut command).await?;
        let dimensions = parse_probe_output(&output.stdout)?;

        tracing::debug!(
            width = dimensions.width,
            height = dimensions.height,
            "Probed video stream"
        );
        Ok(dimensions)
    }
}

/// Extract the first video stream's dimensions from ffprobe JSON
///
/// Missing width or height come back as zero.
pub fn parse_probe_output(stdout: &[u8]) -> Result<Dimensions, MediaError> {
    let probe: ProbeOutput =
        serde_json::from_slice(stdout).map_err(|e| MediaError::ProbeParse(e.to_string()))?;

    let stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or(MediaError::NoVideoStream)?;

    Ok(Dimensions::new(
        stream.width.unwrap_or(0),
        stream.height.unwrap_or(0),
    ))
}
