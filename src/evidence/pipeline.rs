use super::capture::CaptureService;
use super::upload::ObjectStore;
use crate::config::{CaptureConfig, StorageConfig};
use crate::error::{CaptureError, UploadError};
use crate::events::{DoorbellEvent, EventBus};
use crate::timekeeper::RingStamp;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio::time::{sleep, timeout};
use tracing::{error, info, warn};

/// Delays and bounds applied around capture and upload
#[derive(Debug, Clone, Copy)]
pub struct EvidenceTimings {
    /// Wait after the capture program returns before the file is trusted
    pub settle: Duration,
    /// Upper bound on one upload
    pub upload_timeout: Duration,
}

impl EvidenceTimings {
    pub fn from_config(capture: &CaptureConfig, storage: &StorageConfig) -> Self {
        Self {
            settle: Duration::from_millis(capture.settle_ms),
            upload_timeout: Duration::from_secs(storage.timeout_seconds),
        }
    }
}

/// Best-effort evidence trail for a ring: photo on disk, then a remote copy
pub struct EvidencePipeline {
    photos_dir: PathBuf,
    capture: Arc<dyn CaptureService>,
    store: Arc<dyn ObjectStore>,
    timings: EvidenceTimings,
    event_bus: Arc<EventBus>,
}

impl EvidencePipeline {
    pub fn new(
        photos_dir: impl Into<PathBuf>,
        capture: Arc<dyn CaptureService>,
        store: Arc<dyn ObjectStore>,
        timings: EvidenceTimings,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            photos_dir: photos_dir.into(),
            capture,
            store,
            timings,
            event_bus,
        }
    }

    /// Capture a photo for this ring and upload it.
    ///
    /// Returns the local path when the capture program succeeded. Upload
    /// failures are logged and do not affect the result.
    pub async fn capture(&self, stamp: &RingStamp) -> Option<PathBuf> {
        let day_dir = match self.ensure_day_directory(&stamp.date_key).await {
            Ok(dir) => dir,
            Err(e) => {
                error!("{}", e);
                self.report_error(&e.to_string());
                return None;
            }
        };

        let image_path = day_dir.join(stamp.image_file_name());
        if let Err(e) = self.capture.capture(&image_path).await {
            warn!("Evidence capture failed: {}", e);
            self.report_error(&e.to_string());
            return None;
        }

        // Camera warm-up: the file may still be written after the command returns
        sleep(self.timings.settle).await;

        info!("Evidence captured: {}", image_path.display());
        let _ = self.event_bus.publish(DoorbellEvent::EvidenceCaptured {
            path: image_path.clone(),
        });

        match self.upload(&image_path, stamp).await {
            Ok(key) => {
                info!("Upload Successful: {}", key);
                let _ = self
                    .event_bus
                    .publish(DoorbellEvent::EvidenceUploaded { key });
            }
            Err(e) => {
                warn!("Evidence upload failed, not retrying: {}", e);
                self.report_error(&e.to_string());
            }
        }

        Some(image_path)
    }

    /// Upload one photo under its ring's object key
    pub async fn upload(&self, path: &Path, stamp: &RingStamp) -> Result<String, UploadError> {
        let key = stamp.object_key();

        timeout(self.timings.upload_timeout, self.store.upload(path, &key))
            .await
            .map_err(|_| UploadError::Timeout {
                seconds: self.timings.upload_timeout.as_secs(),
            })??;

        Ok(key)
    }

    /// Create `<photos>/<date>`; an existing directory is success
    pub async fn ensure_day_directory(&self, date_key: &str) -> Result<PathBuf, CaptureError> {
        let dir = self.photos_dir.join(date_key);

        match fs::create_dir(&dir).await {
            Ok(()) => {
                info!("Created photo directory {}", dir.display());
                Ok(dir)
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(dir),
            Err(source) => Err(CaptureError::Directory { path: dir, source }),
        }
    }

    /// Create the base photos directory at startup
    pub async fn prepare(&self) -> Result<(), CaptureError> {
        fs::create_dir_all(&self.photos_dir)
            .await
            .map_err(|source| CaptureError::Directory {
                path: self.photos_dir.clone(),
                source,
            })
    }

    pub fn photos_dir(&self) -> &Path {
        &self.photos_dir
    }

    fn report_error(&self, error: &str) {
        let _ = self.event_bus.publish(DoorbellEvent::SystemError {
            component: "evidence".to_string(),
            error: error.to_string(),
        });
    }
}
