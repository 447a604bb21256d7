//! SQLite video store tests

use tsukumo::db::{SqliteVideoStore, StoreError, Video, VideoStore};
use uuid::Uuid;

async fn open(dir: &tempfile::TempDir) -> SqliteVideoStore {
    let url = format!("sqlite://{}", dir.path().join("tsukumo.db").display());
    SqliteVideoStore::connect(&url).await.unwrap()
}

#[tokio::test]
async fn test_create_and_get() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(&dir).await;

    let mut video = Video::new(Uuid::new_v4(), "Boots demo");
    video.description = Some("A pair of boots".into());
    store.create_video(&video).await.unwrap();

    let fetched = store.get_video(video.id).await.unwrap();
    assert_eq!(fetched.id, video.id);
    assert_eq!(fetched.title, "Boots demo");
    assert_eq!(fetched.description.as_deref(), Some("A pair of boots"));
    assert_eq!(fetched.user_id, video.user_id);
    assert!(fetched.thumbnail_url.is_none());
    assert!(fetched.video_url.is_none());
}

#[tokio::test]
async fn test_update_urls() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(&dir).await;

    let mut video = Video::new(Uuid::new_v4(), "Boots demo");
    store.create_video(&video).await.unwrap();

    video.thumbnail_url = Some("http://localhost:8091/assets/abc.png".into());
    video.video_url =
        Some("https://test-bucket.s3.us-east-1.amazonaws.com/landscape/00ff.mp4".into());
    video.updated_at = chrono::Utc::now();
    store.update_video(&video).await.unwrap();

    let fetched = store.get_video(video.id).await.unwrap();
    assert_eq!(fetched.thumbnail_url, video.thumbnail_url);
    assert_eq!(fetched.video_url, video.video_url);
    assert!(fetched.updated_at >= fetched.created_at);
}

#[tokio::test]
async fn test_missing_video() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(&dir).await;
    let id = Uuid::new_v4();

    assert!(matches!(
        store.get_video(id).await,
        Err(StoreError::NotFound(missing)) if missing == id
    ));

    let video = Video::new(Uuid::new_v4(), "never created");
    assert!(matches!(
        store.update_video(&video).await,
        Err(StoreError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_records_survive_reconnect() {
    let dir = tempfile::tempdir().unwrap();
    let video = Video::new(Uuid::new_v4(), "persistent");
    open(&dir).await.create_video(&video).await.unwrap();

    let reopened = open(&dir).await;
    assert_eq!(reopened.get_video(video.id).await.unwrap().title, "persistent");
}
