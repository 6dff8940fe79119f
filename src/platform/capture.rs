//! Capture execution surface
//!
//! Commands return immediately; completion is reported later through a
//! [`PhotoCallback`] or a [`RecordingListener`]. Implementations may invoke
//! callbacks from any thread, including synchronously from inside the call.

use crate::capabilities::SensorTuning;
use crate::configuration::Configuration;
use crate::environment::{Location, Orientation};
use crate::errors::CameraError;
use crate::types::{CaptureMode, FlashMode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Everything the hardware needs to (re)open the capture pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct BindRequest {
    pub configuration: Configuration,
    pub sensor_tuning: SensorTuning,
}

/// Where a capture should be written; the storage layer resolves the name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputTarget {
    pub id: Uuid,
    pub file_name: String,
    pub mime_type: String,
}

impl OutputTarget {
    /// Timestamped target for a capture in the given mode
    pub fn for_capture(mode: CaptureMode, at: DateTime<Utc>) -> Self {
        let (prefix, extension, mime_type) = match mode {
            CaptureMode::Video => ("VID", "mp4", "video/mp4"),
            CaptureMode::Photo | CaptureMode::Qr => ("IMG", "jpg", "image/jpeg"),
        };
        Self {
            id: Uuid::new_v4(),
            file_name: format!("{}_{}.{}", prefix, at.format("%Y%m%d_%H%M%S%3f"), extension),
            mime_type: mime_type.to_string(),
        }
    }
}

/// Metadata stamped on a capture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureMetadata {
    pub captured_at: DateTime<Utc>,
    pub orientation: Orientation,
    pub location: Option<Location>,
    pub flash_mode: FlashMode,
    pub mirrored: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhotoRequest {
    pub output: OutputTarget,
    pub metadata: CaptureMetadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioConfig {
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VideoRequest {
    pub output: OutputTarget,
    pub metadata: CaptureMetadata,
    pub audio: AudioConfig,
}

/// Result of a successful photo capture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoOutput {
    pub output: OutputTarget,
    pub saved_uri: Option<String>,
}

/// Result of a finalized recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoOutput {
    pub output: OutputTarget,
    pub duration: Duration,
    pub bytes_written: u64,
}

pub type PhotoCallback = Box<dyn FnOnce(Result<PhotoOutput, CameraError>) + Send + 'static>;

/// Asynchronous status of an active recording
#[derive(Debug, Clone, PartialEq)]
pub enum RecordingEvent {
    /// The hardware confirmed that frames are being recorded
    Started,
    Status { duration: Duration, bytes_written: u64 },
    Paused,
    Resumed,
    /// Terminal event, delivered exactly once for every started recording
    Finalized(Result<VideoOutput, CameraError>),
}

pub type RecordingListener = Arc<dyn Fn(RecordingEvent) + Send + Sync + 'static>;

/// Control surface of an active recording
pub trait RecordingHandle: Send + Sync {
    fn pause(&self);
    fn resume(&self);
    fn stop(&self);
}

/// Command surface of the camera hardware
pub trait CaptureBackend: Send + Sync {
    /// Rebind the capture pipeline to a new configuration
    fn bind(&self, request: &BindRequest) -> Result<(), CameraError>;

    fn take_photo(&self, request: PhotoRequest, callback: PhotoCallback);

    fn start_video_recording(
        &self,
        request: VideoRequest,
        listener: RecordingListener,
    ) -> Result<Arc<dyn RecordingHandle>, CameraError>;

    fn set_flash_mode(&self, mode: FlashMode);

    fn set_zoom_ratio(&self, ratio: f32);

    fn set_exposure_compensation(&self, index: i32);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_output_target_names() {
        let at = Utc.with_ymd_and_hms(2024, 5, 17, 9, 30, 12).unwrap();
        let photo = OutputTarget::for_capture(CaptureMode::Photo, at);
        assert_eq!(photo.file_name, "IMG_20240517_093012000.jpg");
        assert_eq!(photo.mime_type, "image/jpeg");

        let video = OutputTarget::for_capture(CaptureMode::Video, at);
        assert!(video.file_name.starts_with("VID_20240517"));
        assert!(video.file_name.ends_with(".mp4"));
        assert_ne!(photo.id, video.id);
    }
}
