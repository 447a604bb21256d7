//! Configuration module for Tsukumo
//!
//! Handles loading and parsing of YAML configuration files with support for
//! environment variable expansion and validation.
//!
//! ```yaml
//! server:
//!   address: "0.0.0.0:8091"
//!   max_video_bytes: 1073741824
//! auth:
//!   jwt_secret: "${JWT_SECRET}"
//! assets:
//!   root: ./assets
//!   base_url: http://localhost:8091
//! s3:
//!   bucket: tubely-videos
//!   region: "${AWS_REGION:-us-east-2}"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

/// 1 GiB
pub const DEFAULT_MAX_VIDEO_BYTES: u64 = 1 << 30;
/// 10 MiB
pub const DEFAULT_MAX_THUMBNAIL_BYTES: u64 = 10 << 20;

/// Validate that a URL starts with http:// or https://
fn is_valid_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub assets: AssetsConfig,
    pub s3: S3Config,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Config {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        ConfigLoader::load(path)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.jwt_secret.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "auth.jwt_secret must not be empty".into(),
            ));
        }

        if self.server.max_video_bytes == 0 || self.server.max_thumbnail_bytes == 0 {
            return Err(ConfigError::ValidationError(
                "Upload size limits must be greater than zero".into(),
            ));
        }

        if self.assets.root.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "assets.root must not be empty".into(),
            ));
        }

        if !is_valid_http_url(&self.assets.base_url) {
            return Err(ConfigError::ValidationError(
                "Invalid assets.base_url: must start with http:// or https://".into(),
            ));
        }

        if self.s3.bucket.trim().is_empty() || self.s3.region.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "s3.bucket and s3.region must be set".into(),
            ));
        }

        if let Some(ref endpoint) = self.s3.endpoint {
            if !is_valid_http_url(endpoint) {
                return Err(ConfigError::ValidationError(
                    "Invalid s3.endpoint: must start with http:// or https://".into(),
                ));
            }
        }

        if self.s3.access_key.is_some() != self.s3.secret_key.is_some() {
            return Err(ConfigError::ValidationError(
                "s3.access_key and s3.secret_key must be set together".into(),
            ));
        }

        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default = "default_max_video_bytes")]
    pub max_video_bytes: u64,
    #[serde(default = "default_max_thumbnail_bytes")]
    pub max_thumbnail_bytes: u64,
    /// Where uploads are staged; system temp dir when unset
    #[serde(default)]
    pub staging_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            max_video_bytes: default_max_video_bytes(),
            max_thumbnail_bytes: default_max_thumbnail_bytes(),
            staging_dir: None,
        }
    }
}

impl ServerConfig {
    pub fn staging_dir(&self) -> PathBuf {
        self.staging_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

fn default_address() -> String {
    "0.0.0.0:8091".into()
}

fn default_max_video_bytes() -> u64 {
    DEFAULT_MAX_VIDEO_BYTES
}

fn default_max_thumbnail_bytes() -> u64 {
    DEFAULT_MAX_THUMBNAIL_BYTES
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    #[serde(default)]
    pub issuer: Option<String>,
}

/// Local thumbnail storage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetsConfig {
    pub root: String,
    /// Public origin prepended to `/assets/{key}`
    pub base_url: String,
}

/// S3 configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub access_key: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
}

/// Record store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "sqlite://tsukumo.db".into()
}

/// External media tools
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: String,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            ffprobe_path: default_ffprobe_path(),
        }
    }
}

fn default_ffmpeg_path() -> String {
    "ffmpeg".into()
}

fn default_ffprobe_path() -> String {
    "ffprobe".into()
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            port: default_metrics_port(),
        }
    }
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_metrics_port() -> u16 {
    9090
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
auth:
  jwt_secret: "s3cr3t"
assets:
  root: ./assets
  base_url: http://localhost:8091
s3:
  bucket: tubely-videos
  region: us-east-2
"#;

    #[test]
    fn test_minimal_config_defaults() {
        let config = ConfigLoader::from_yaml(MINIMAL).unwrap();

        assert_eq!(config.server.address, "0.0.0.0:8091");
        assert_eq!(config.server.max_video_bytes, 1024 * 1024 * 1024);
        assert_eq!(config.server.max_thumbnail_bytes, 10 * 1024 * 1024);
        assert_eq!(config.server.staging_dir(), std::env::temp_dir());
        assert_eq!(config.database.url, "sqlite://tsukumo.db");
        assert_eq!(config.media.ffmpeg_path, "ffmpeg");
        assert_eq!(config.media.ffprobe_path, "ffprobe");
        assert!(config.metrics.enabled);
        assert_eq!(config.metrics.port, 9090);
        assert!(config.s3.endpoint.is_none());
    }

    #[test]
    fn test_env_expansion_in_config() {
        std::env::set_var("TSUKUMO_TEST_BUCKET", "from-env");
        let yaml = MINIMAL.replace("tubely-videos", "${TSUKUMO_TEST_BUCKET}");
        let config = ConfigLoader::from_yaml(&yaml).unwrap();
        assert_eq!(config.s3.bucket, "from-env");
        std::env::remove_var("TSUKUMO_TEST_BUCKET");
    }

    #[test]
    fn test_empty_secret_rejected() {
        let yaml = MINIMAL.replace("\"s3cr3t\"", "\"\"");
        assert!(matches!(
            ConfigLoader::from_yaml(&yaml),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_bad_base_url_rejected() {
        let yaml = MINIMAL.replace("http://localhost:8091", "localhost:8091");
        assert!(matches!(
            ConfigLoader::from_yaml(&yaml),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_bad_endpoint_rejected() {
        let yaml = format!("{}  endpoint: minio:9000\n", MINIMAL);
        assert!(matches!(
            ConfigLoader::from_yaml(&yaml),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_half_credentials_rejected() {
        let yaml = format!("{}  access_key: AKIA\n", MINIMAL);
        assert!(matches!(
            ConfigLoader::from_yaml(&yaml),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_zero_limit_rejected() {
        let yaml = format!("server:\n  max_video_bytes: 0\n{}", MINIMAL);
        assert!(matches!(
            ConfigLoader::from_yaml(&yaml),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_missing_section_is_parse_error() {
        assert!(matches!(
            ConfigLoader::from_yaml("auth:\n  jwt_secret: x\n"),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, MINIMAL).unwrap();
        assert_eq!(Config::load(&path).unwrap().s3.region, "us-east-2");
    }
}
