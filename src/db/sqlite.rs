//! SQLite record store

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use uuid::Uuid;

use super::{StoreError, Video, VideoStore};

const CREATE_VIDEOS: &str = r#"
CREATE TABLE IF NOT EXISTS videos (
    id BLOB PRIMARY KEY NOT NULL,
    title TEXT NOT NULL,
    description TEXT,
    thumbnail_url TEXT,
    video_url TEXT,
    user_id BLOB NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)
"#;

/// [`VideoStore`] backed by a SQLite database
#[derive(Debug, Clone)]
pub struct SqliteVideoStore {
    pool: SqlitePool,
}

impl SqliteVideoStore {
    /// Open (creating if needed) the database at `url` and ensure the schema
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        sqlx::query(CREATE_VIDEOS).execute(&pool).await?;

        tracing::info!(url = %url, "Connected to video store");
        Ok(Self { pool })
    }
}

#[async_trait]
impl VideoStore for SqliteVideoStore {
    async fn create_video(&self, video: &Video) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO videos (id, title, description, thumbnail_url, video_url, user_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(video.id)
        .bind(&video.title)
        .bind(&video.description)
        .bind(&video.thumbnail_url)
        .bind(&video.video_url)
        .bind(video.user_id)
        .bind(video.created_at)
        .bind(video.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(video_id = %video.id, error = %e, "Failed to create video");
            StoreError::from(e)
        })?;

        Ok(())
    }

    async fn get_video(&self, id: Uuid) -> Result<Video, StoreError> {
        sqlx::query_as::<_, Video>(
            r#"
            SELECT id, title, description, thumbnail_url, video_url, user_id, created_at, updated_at
            FROM videos
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(video_id = %id, error = %e, "Failed to fetch video");
            StoreError::from(e)
        })?
        .ok_or(StoreError::NotFound(id))
    }

    async fn update_video(&self, video: &Video) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE videos
            SET title = ?, description = ?, thumbnail_url = ?, video_url = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&video.title)
        .bind(&video.description)
        .bind(&video.thumbnail_url)
        .bind(&video.video_url)
        .bind(video.updated_at)
        .bind(video.id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(video_id = %video.id, error = %e, "Failed to update video");
            StoreError::from(e)
        })?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(video.id));
        }
        Ok(())
    }
}
