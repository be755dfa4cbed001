use super::*;
use crate::error::UploadError;
use crate::events::{DoorbellEvent, EventBus};
use crate::testing::{FakeCapture, FakeStore, StoreBehavior};
use crate::timekeeper::RingStamp;
use std::sync::Arc;
use std::time::Duration;

fn test_timings() -> EvidenceTimings {
    EvidenceTimings {
        settle: Duration::from_millis(10),
        upload_timeout: Duration::from_millis(200),
    }
}

fn test_stamp() -> RingStamp {
    RingStamp {
        date_key: "2024-5-1".to_string(),
        time_key: "14-3-10".to_string(),
    }
}

#[tokio::test]
async fn test_capture_writes_into_day_directory_and_uploads() {
    let dir = tempfile::tempdir().unwrap();
    let capture = FakeCapture::new();
    let store = FakeStore::new(StoreBehavior::Succeed);
    let pipeline = EvidencePipeline::new(
        dir.path(),
        capture.clone(),
        store.clone(),
        test_timings(),
        Arc::new(EventBus::new(16)),
    );

    let path = pipeline.capture(&test_stamp()).await.unwrap();

    assert_eq!(path, dir.path().join("2024-5-1").join("2024-5-1_14-3-10.jpg"));
    assert!(path.exists());

    let uploads = store.uploads.lock();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].0, path);
    assert_eq!(uploads[0].1, "2024-5-1 - 14-3-10.jpg");
}

#[tokio::test]
async fn test_existing_day_directory_is_reused() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("2024-5-1")).unwrap();
    let pipeline = EvidencePipeline::new(
        dir.path(),
        FakeCapture::new(),
        FakeStore::new(StoreBehavior::Succeed),
        test_timings(),
        Arc::new(EventBus::new(16)),
    );

    assert!(pipeline.capture(&test_stamp()).await.is_some());
    assert!(pipeline.capture(&test_stamp()).await.is_some());
}

#[tokio::test]
async fn test_failed_capture_skips_upload() {
    let dir = tempfile::tempdir().unwrap();
    let store = FakeStore::new(StoreBehavior::Succeed);
    let pipeline = EvidencePipeline::new(
        dir.path(),
        FakeCapture::failing(),
        store.clone(),
        test_timings(),
        Arc::new(EventBus::new(16)),
    );

    assert!(pipeline.capture(&test_stamp()).await.is_none());
    assert!(store.uploads.lock().is_empty());
}

#[tokio::test]
async fn test_rejected_credentials_keep_local_photo() {
    let dir = tempfile::tempdir().unwrap();
    let event_bus = Arc::new(EventBus::new(16));
    let mut events = event_bus.subscribe();
    let store = FakeStore::new(StoreBehavior::RejectCredentials);
    let pipeline = EvidencePipeline::new(
        dir.path(),
        FakeCapture::new(),
        store.clone(),
        test_timings(),
        Arc::clone(&event_bus),
    );

    let path = pipeline.capture(&test_stamp()).await.unwrap();
    assert!(path.exists());
    // No retry
    assert_eq!(store.uploads.lock().len(), 1);

    let mut saw_error = false;
    while let Ok(event) = events.try_recv() {
        match event {
            DoorbellEvent::EvidenceUploaded { .. } => panic!("Upload should not be reported"),
            DoorbellEvent::SystemError { component, .. } => {
                assert_eq!(component, "evidence");
                saw_error = true;
            }
            _ => {}
        }
    }
    assert!(saw_error);
}

#[tokio::test]
async fn test_upload_bounded_by_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = EvidencePipeline::new(
        dir.path(),
        FakeCapture::new(),
        FakeStore::new(StoreBehavior::Hang),
        test_timings(),
        Arc::new(EventBus::new(16)),
    );
    let photo = dir.path().join("photo.jpg");
    std::fs::write(&photo, b"jpeg").unwrap();

    let result = pipeline.upload(&photo, &test_stamp()).await;
    assert!(matches!(result, Err(UploadError::Timeout { .. })));
}

#[tokio::test]
async fn test_unwritable_base_directory_yields_none() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, b"file").unwrap();

    let capture = FakeCapture::new();
    let pipeline = EvidencePipeline::new(
        &blocker,
        capture.clone(),
        FakeStore::new(StoreBehavior::Succeed),
        test_timings(),
        Arc::new(EventBus::new(16)),
    );

    assert!(pipeline.capture(&test_stamp()).await.is_none());
    assert!(capture.calls.lock().is_empty());
}

#[tokio::test]
async fn test_prepare_creates_base_directory() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("Photos");
    let pipeline = EvidencePipeline::new(
        &base,
        FakeCapture::new(),
        FakeStore::new(StoreBehavior::Succeed),
        test_timings(),
        Arc::new(EventBus::new(16)),
    );

    pipeline.prepare().await.unwrap();
    assert!(base.is_dir());
    assert_eq!(pipeline.photos_dir(), base.as_path());
}
