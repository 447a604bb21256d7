//! Staged uploads
//!
//! An upload is streamed into a temporary file before anything else touches
//! it. The file lives exactly as long as its [`StagedFile`] handle.
//!
//! # Flow
//!
//! 1. Create a uniquely named file in the staging directory
//! 2. Copy the incoming stream into it, counting bytes against the ceiling
//! 3. Flush and seek back to the start for the next stage
//! 4. Remove the file on drop, whatever happened in between
//!
//! # Example
//!
//! ```no_run
//! use bytes::Bytes;
//! use futures::stream;
//! use tsukumo::upload::temp_file::StagedFile;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let body = stream::iter(vec![Ok::<_, std::io::Error>(Bytes::from("Hello, World!"))]);
//! let staged = StagedFile::from_stream(&std::env::temp_dir(), "video", body, 1024).await?;
//!
//! println!("File: {:?}", staged.path());
//! println!("Size: {} bytes", staged.size());
//! # Ok(())
//! # }
//! ```

use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};

/// Staging errors
#[derive(Error, Debug)]
pub enum StagingError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Upload exceeds {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("Failed to read upload body: {0}")]
    Body(String),
}

/// Request-scoped temporary copy of an upload
///
/// Automatically removed when dropped (RAII pattern).
pub struct StagedFile {
    path: PathBuf,
    file: Option<File>,
    size: u64,
}

impl StagedFile {
    /// Stream `body` into a new temp file under `dir`
    ///
    /// Fails with [`StagingError::TooLarge`] as soon as more than `limit`
    /// bytes have arrived. Any partial file is removed before returning.
    pub async fn from_stream<S, E>(
        dir: &Path,
        label: &str,
        body: S,
        limit: u64,
    ) -> Result<Self, StagingError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Into<StagingError>,
    {
        let path = dir.join(format!("tsukumo-{}-{}.tmp", label, uuid::Uuid::new_v4()));
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;

        // From here on, drop removes the file
        let mut staged = Self {
            path,
            file: Some(file),
            size: 0,
        };
        staged.copy_from(body, limit).await?;

        tracing::debug!(
            path = %staged.path.display(),
            bytes = staged.size,
            "Upload staged"
        );
        Ok(staged)
    }

    /// Take ownership of a path another stage is about to write
    ///
    /// The path is removed on drop whether or not anything was ever written
    /// there, so a producer cancelled mid-write leaves nothing behind.
    pub fn reserve(path: PathBuf) -> Self {
        Self {
            path,
            file: None,
            size: 0,
        }
    }

    /// Open the produced content of a reserved path
    ///
    /// On failure the reservation is dropped and the path removed.
    pub async fn open(mut self) -> Result<Self, StagingError> {
        let file = File::open(&self.path).await?;
        self.size = file.metadata().await?.len();
        self.file = Some(file);
        Ok(self)
    }

    /// Take ownership of a file another stage produced
    ///
    /// The file is removed on drop even if opening it fails here.
    pub async fn adopt(path: PathBuf) -> Result<Self, StagingError> {
        Self::reserve(path).open().await
    }

    /// Get the path to the staged file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the size of the staged content in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Reader positioned at the start of the content
    pub async fn reader(&mut self) -> Result<&mut File, StagingError> {
        let file = match self.file.take() {
            Some(file) => file,
            None => File::open(&self.path).await?,
        };
        let file = self.file.insert(file);
        file.seek(SeekFrom::Start(0)).await?;
        Ok(file)
    }

    async fn copy_from<S, E>(&mut self, body: S, limit: u64) -> Result<(), StagingError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Into<StagingError>,
    {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| StagingError::Body("staged file is not open".into()))?;

        let mut body = std::pin::pin!(body);
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(Into::into)?;
            self.size += chunk.len() as u64;
            if self.size > limit {
                return Err(StagingError::TooLarge { limit });
            }
            file.write_all(&chunk).await?;
        }

        file.flush().await?;
        file.seek(SeekFrom::Start(0)).await?;
        Ok(())
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        // Close before unlinking
        self.file.take();

        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to clean up staged file"
                );
            }
        }
    }
}
