//! Interfaces to the camera hardware stack
//!
//! The session treats the driver layer as a black box that reports devices
//! and capabilities ([`CapabilitySource`]) and accepts capture commands
//! ([`CaptureBackend`]). Concrete implementations live outside this crate;
//! [`crate::testing`] provides synthetic ones.

pub mod capture;
pub mod device_monitor;

pub use capture::{
    AudioConfig, BindRequest, CaptureBackend, CaptureMetadata, OutputTarget, PhotoCallback,
    PhotoOutput, PhotoRequest, RecordingEvent, RecordingHandle, RecordingListener, VideoOutput,
    VideoRequest,
};
pub use device_monitor::{DeviceEvent, DeviceMonitor};

use crate::errors::CameraError;
use crate::types::{DynamicRange, Facing, FpsRange, VideoQuality};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Static identity of a device as enumerated by the hardware layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub id: String,
    pub facing: Facing,
    /// Physical sensors backing a logical device; empty for a plain physical camera
    #[serde(default)]
    pub physical_ids: Vec<String>,
    #[serde(default = "default_zoom_ratio")]
    pub intrinsic_zoom_ratio: f32,
}

fn default_zoom_ratio() -> f32 {
    1.0
}

impl DeviceDescriptor {
    pub fn new(id: impl Into<String>, facing: Facing) -> Self {
        Self {
            id: id.into(),
            facing,
            physical_ids: Vec::new(),
            intrinsic_zoom_ratio: 1.0,
        }
    }

    pub fn with_physical_ids(mut self, ids: &[&str]) -> Self {
        self.physical_ids = ids.iter().map(|id| id.to_string()).collect();
        self
    }

    pub fn with_intrinsic_zoom_ratio(mut self, ratio: f32) -> Self {
        self.intrinsic_zoom_ratio = ratio;
        self
    }
}

/// Encoder profile the hardware reports for one video quality
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoProfile {
    pub quality: VideoQuality,
    pub fps_ranges: Vec<FpsRange>,
    pub dynamic_ranges: Vec<DynamicRange>,
}

/// Raw capability report for one device, as delivered by the driver layer.
///
/// Sensor tuning and extension values are raw integers; unrecognised values
/// are dropped when the report is turned into a `CapabilitySet`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapabilityReport {
    pub has_flash_unit: bool,
    pub extension_modes: Vec<i32>,
    pub edge_modes: Vec<i32>,
    pub noise_reduction_modes: Vec<i32>,
    pub shading_modes: Vec<i32>,
    pub color_correction_aberration_modes: Vec<i32>,
    pub distortion_correction_modes: Vec<i32>,
    pub hot_pixel_modes: Vec<i32>,
    pub sensor_fps_ranges: Vec<FpsRange>,
    /// Profiles in device-declared order
    pub video_profiles: Vec<VideoProfile>,
    pub encoder_dynamic_ranges: Vec<DynamicRange>,
    pub zoom_ratio_range: (f32, f32),
    pub exposure_compensation_range: (i32, i32),
    pub exposure_compensation_step: f32,
    pub video_stabilization_supported: bool,
    pub zero_shutter_lag_supported: bool,
    pub high_resolution_supported: bool,
}

impl Default for CapabilityReport {
    fn default() -> Self {
        Self {
            has_flash_unit: false,
            extension_modes: Vec::new(),
            edge_modes: Vec::new(),
            noise_reduction_modes: Vec::new(),
            shading_modes: Vec::new(),
            color_correction_aberration_modes: Vec::new(),
            distortion_correction_modes: Vec::new(),
            hot_pixel_modes: Vec::new(),
            sensor_fps_ranges: Vec::new(),
            video_profiles: Vec::new(),
            encoder_dynamic_ranges: vec![DynamicRange::Sdr],
            zoom_ratio_range: (1.0, 1.0),
            exposure_compensation_range: (0, 0),
            exposure_compensation_step: 1.0,
            video_stabilization_supported: false,
            zero_shutter_lag_supported: false,
            high_resolution_supported: false,
        }
    }
}

/// Source of device enumeration, capability reports and hot-plug events
pub trait CapabilitySource: Send + Sync {
    /// Currently attached devices, in driver order
    fn enumerate(&self) -> Result<Vec<DeviceDescriptor>, CameraError>;

    /// Raw capabilities of one device
    fn capabilities(&self, device: &DeviceDescriptor) -> Result<CapabilityReport, CameraError>;

    /// Attach/detach notifications; each call returns a fresh subscription
    fn subscribe(&self) -> mpsc::UnboundedReceiver<DeviceEvent>;
}
