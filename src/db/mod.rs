//! Video record store
//!
//! The pipeline only needs to read a record and write it back. Two
//! implementations are provided: [`SqliteVideoStore`] for real deployments and
//! [`MemoryVideoStore`] for tests and throwaway runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub mod memory;
pub mod sqlite;

pub use memory::MemoryVideoStore;
pub use sqlite::SqliteVideoStore;

/// Record store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Video not found: {0}")]
    NotFound(Uuid),

    #[error("Database error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

/// A video record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Video {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    pub video_url: Option<String>,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Video {
    /// New record owned by `user_id`, with no media attached
    pub fn new(user_id: Uuid, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            description: None,
            thumbnail_url: None,
            video_url: None,
            user_id,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Backing store for video records
#[async_trait]
pub trait VideoStore: Send + Sync {
    async fn create_video(&self, video: &Video) -> Result<(), StoreError>;

    /// Fetch a record, or [`StoreError::NotFound`]
    async fn get_video(&self, id: Uuid) -> Result<Video, StoreError>;

    /// Overwrite an existing record, or [`StoreError::NotFound`]
    async fn update_video(&self, video: &Video) -> Result<(), StoreError>;
}
