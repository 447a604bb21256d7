//! Local filesystem storage for thumbnails
//!
//! Objects are written flat under the assets root and served back by the HTTP
//! server under `/assets/`.

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use super::{MediaStorage, StorageError, StoredObject};
use crate::config::AssetsConfig;
use crate::media::MediaType;
use crate::upload::key::ObjectKey;
use crate::upload::temp_file::StagedFile;

/// Route prefix the server serves assets from
pub const ASSETS_ROUTE: &str = "/assets/";

/// Filesystem-backed [`MediaStorage`]
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
    base_url: String,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>, base_url: &str) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &AssetsConfig) -> Self {
        Self::new(&config.root, &config.base_url)
    }

    /// Map a relative asset path onto the root
    ///
    /// Returns `None` for anything that could escape the root: absolute
    /// paths, `..`, or empty segments.
    pub fn resolve(&self, relative: &str) -> Option<PathBuf> {
        if relative.is_empty() {
            return None;
        }

        let relative = Path::new(relative);
        let mut components = relative.components().peekable();
        components.peek()?;
        if components.all(|c| matches!(c, Component::Normal(_))) {
            Some(self.root.join(relative))
        } else {
            None
        }
    }

    async fn write(&self, dest: &Path, staged: &mut StagedFile) -> Result<u64, StorageError> {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(dest)
            .await?;

        let reader = staged.reader().await?;
        let written = tokio::io::copy(reader, &mut file).await?;
        file.flush().await?;
        file.sync_all().await?;
        Ok(written)
    }
}

#[async_trait]
impl MediaStorage for LocalStorage {
    #[tracing::instrument(
        name = "storage.local.store",
        skip_all,
        fields(key = %key, content_type = %media_type, bytes = staged.size()),
        err
    )]
    async fn store(
        &self,
        key: &ObjectKey,
        media_type: &MediaType,
        staged: &mut StagedFile,
    ) -> Result<StoredObject, StorageError> {
        let dest = self
            .resolve(key.as_str())
            .ok_or_else(|| StorageError::InvalidKey(key.to_string()))?;

        tokio::fs::create_dir_all(&self.root).await?;

        let bytes_written = match self.write(&dest, staged).await {
            Ok(written) => written,
            Err(e) => {
                if let Err(remove_err) = tokio::fs::remove_file(&dest).await {
                    if remove_err.kind() != std::io::ErrorKind::NotFound {
                        tracing::warn!(
                            path = %dest.display(),
                            error = %remove_err,
                            "Failed to remove partial asset"
                        );
                    }
                }
                return Err(e);
            }
        };

        tracing::info!(bytes_written, "Asset written");

        Ok(StoredObject {
            key: key.to_string(),
            url: self.url_for(key),
            bytes_written,
        })
    }

    fn url_for(&self, key: &ObjectKey) -> String {
        format!("{}{}{}", self.base_url, ASSETS_ROUTE, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_for() {
        let storage = LocalStorage::new("/srv/assets", "http://localhost:8091/");
        let png = MediaType::parse_for(crate::media::UploadKind::Thumbnail, Some("image/png")).unwrap();
        let key = ObjectKey::thumbnail("abc", &png);
        assert_eq!(storage.url_for(&key), "http://localhost:8091/assets/abc.png");
    }

    #[test]
    fn test_resolve_rejects_escapes() {
        let storage = LocalStorage::new("/srv/assets", "http://localhost:8091");

        assert_eq!(
            storage.resolve("abc.png"),
            Some(PathBuf::from("/srv/assets/abc.png"))
        );
        assert!(storage.resolve("").is_none());
        assert!(storage.resolve("../etc/passwd").is_none());
        assert!(storage.resolve("a/../../b").is_none());
        assert!(storage.resolve("/etc/passwd").is_none());
    }
}
