//! Reference devices modelled on a typical phone camera stack
//!
//! * `"0"` primary back: logical camera with flash, extensions, ZSL, high
//!   resolution, stabilization and a logical zoom table
//! * `"1"` primary front: no flash unit, a single video quality
//! * `"2"` auxiliary ultra-wide back camera
//!
//! External cameras are created on demand with [`external_camera`].

use crate::config::{CameraPolicy, LogicalZoomRatio};
use crate::device::Device;
use crate::platform::{CapabilityReport, DeviceDescriptor, VideoProfile};
use crate::types::{DynamicRange, Facing, FpsRange, VideoQuality};
use std::sync::Arc;

fn profile(quality: VideoQuality, fps: &[FpsRange], ranges: &[DynamicRange]) -> VideoProfile {
    VideoProfile {
        quality,
        fps_ranges: fps.to_vec(),
        dynamic_ranges: ranges.to_vec(),
    }
}

/// Back camera report.
///
/// Video qualities in device order: FHD (24/30/60 fps), UHD (30 fps) and SD,
/// which only offers a variable frame-rate range.
pub fn back_report() -> CapabilityReport {
    CapabilityReport {
        has_flash_unit: true,
        extension_modes: vec![1, 2, 3],
        edge_modes: vec![0, 1, 2, 3],
        noise_reduction_modes: vec![0, 1, 2, 3, 4],
        shading_modes: vec![0, 1, 2],
        color_correction_aberration_modes: vec![0, 1, 2],
        distortion_correction_modes: vec![0, 1, 2],
        hot_pixel_modes: vec![0, 1, 2],
        sensor_fps_ranges: vec![
            FpsRange::fixed(24),
            FpsRange::fixed(30),
            FpsRange::fixed(60),
            FpsRange::new(15, 25),
        ],
        video_profiles: vec![
            profile(
                VideoQuality::Fhd,
                &[FpsRange::fixed(24), FpsRange::fixed(30), FpsRange::fixed(60)],
                &[DynamicRange::Sdr, DynamicRange::Hlg10Bit, DynamicRange::Hdr10_10Bit],
            ),
            profile(
                VideoQuality::Uhd,
                &[FpsRange::fixed(30)],
                &[DynamicRange::Sdr, DynamicRange::Hlg10Bit],
            ),
            profile(VideoQuality::Sd, &[FpsRange::new(15, 25)], &[DynamicRange::Sdr]),
        ],
        encoder_dynamic_ranges: vec![DynamicRange::Sdr, DynamicRange::Hlg10Bit],
        zoom_ratio_range: (0.6, 10.0),
        exposure_compensation_range: (-12, 12),
        exposure_compensation_step: 1.0 / 6.0,
        video_stabilization_supported: true,
        zero_shutter_lag_supported: true,
        high_resolution_supported: true,
    }
}

pub fn front_report() -> CapabilityReport {
    CapabilityReport {
        has_flash_unit: false,
        edge_modes: vec![0, 1],
        noise_reduction_modes: vec![0, 1],
        sensor_fps_ranges: vec![FpsRange::fixed(30)],
        video_profiles: vec![profile(
            VideoQuality::Fhd,
            &[FpsRange::fixed(30)],
            &[DynamicRange::Sdr],
        )],
        zoom_ratio_range: (1.0, 4.0),
        exposure_compensation_range: (-6, 6),
        exposure_compensation_step: 1.0 / 3.0,
        ..CapabilityReport::default()
    }
}

pub fn ultra_wide_report() -> CapabilityReport {
    CapabilityReport {
        has_flash_unit: true,
        sensor_fps_ranges: vec![FpsRange::fixed(30)],
        video_profiles: vec![profile(
            VideoQuality::Fhd,
            &[FpsRange::fixed(30)],
            &[DynamicRange::Sdr],
        )],
        zoom_ratio_range: (1.0, 2.0),
        ..CapabilityReport::default()
    }
}

/// The three internal reference cameras, in driver order
pub fn reference_devices() -> Vec<(DeviceDescriptor, CapabilityReport)> {
    vec![
        (
            DeviceDescriptor::new("0", Facing::Back).with_physical_ids(&["3", "4"]),
            back_report(),
        ),
        (DeviceDescriptor::new("1", Facing::Front), front_report()),
        (
            DeviceDescriptor::new("2", Facing::Back).with_intrinsic_zoom_ratio(0.6),
            ultra_wide_report(),
        ),
    ]
}

/// Overlay with a logical zoom table for the primary back camera
pub fn reference_policy() -> CameraPolicy {
    let zoom = |ratio: f32, effective_ratio: f32| LogicalZoomRatio {
        camera_id: "0".to_string(),
        ratio,
        effective_ratio,
    };
    CameraPolicy {
        logical_zoom_ratios: vec![zoom(0.6, 0.6), zoom(1.0, 1.0), zoom(2.0, 2.2), zoom(5.0, 5.0)],
        ..CameraPolicy::default()
    }
}

/// Hot-pluggable USB camera
pub fn external_camera(id: &str) -> (DeviceDescriptor, CapabilityReport) {
    (
        DeviceDescriptor::new(id, Facing::External),
        CapabilityReport {
            sensor_fps_ranges: vec![FpsRange::fixed(30)],
            video_profiles: vec![profile(
                VideoQuality::Hd,
                &[FpsRange::fixed(30)],
                &[DynamicRange::Sdr],
            )],
            ..CapabilityReport::default()
        },
    )
}

fn device(descriptor: &DeviceDescriptor, report: &CapabilityReport) -> Arc<Device> {
    Arc::new(Device::new(descriptor, report, &reference_policy()))
}

pub fn back_camera() -> Arc<Device> {
    let (descriptor, report) = &reference_devices()[0];
    device(descriptor, report)
}

pub fn front_camera() -> Arc<Device> {
    let (descriptor, report) = &reference_devices()[1];
    device(descriptor, report)
}

/// External camera reporting no video profile at all
pub fn camera_without_video() -> Arc<Device> {
    device(
        &DeviceDescriptor::new("usb-still", Facing::External),
        &CapabilityReport::default(),
    )
}
