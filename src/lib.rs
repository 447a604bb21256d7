//! Tsukumo Library
//!
//! Media upload service: thumbnails are stored on local disk and served back
//! under `/assets/`, videos are fast-started with ffmpeg, bucketed by aspect
//! ratio, and uploaded to S3. Each successful upload records its URL on the
//! owning video record.
//!
//! # Features
//!
//! - **Owner-only uploads**: HS256 JWT bearer auth plus a video ownership check
//! - **Streaming**: multipart bodies stream straight into a staged temp file
//! - **No leftovers**: staged files are removed on every exit path
//! - **Fast-start**: videos are rewritten so playback can begin before download completes
//!
//! # Example
//!
//! ```no_run
//! use tsukumo::{config::Config, server::Server};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let server = Server::new(&config).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod config;
pub mod db;
pub mod media;
pub mod metrics;
pub mod router;
pub mod server;
pub mod storage;
pub mod upload;

// Re-export commonly used types
pub use config::Config;
pub use server::Server;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
