//! In-memory record store

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use super::{StoreError, Video, VideoStore};

/// [`VideoStore`] kept in a concurrent map
#[derive(Debug, Default)]
pub struct MemoryVideoStore {
    videos: DashMap<Uuid, Video>,
}

impl MemoryVideoStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.videos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.videos.is_empty()
    }
}

#[async_trait]
impl VideoStore for MemoryVideoStore {
    async fn create_video(&self, video: &Video) -> Result<(), StoreError> {
        self.videos.insert(video.id, video.clone());
        Ok(())
    }

    async fn get_video(&self, id: Uuid) -> Result<Video, StoreError> {
        self.videos
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(StoreError::NotFound(id))
    }

    async fn update_video(&self, video: &Video) -> Result<(), StoreError> {
        match self.videos.get_mut(&video.id) {
            Some(mut entry) => {
                *entry = video.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(video.id)),
        }
    }
}
