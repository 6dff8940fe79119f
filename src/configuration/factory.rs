//! Initial configuration for a camera and capture mode
//!
//! Values come from the stored preferences and fall back to the first value
//! the camera supports.

use super::{Configuration, PhotoConfiguration, QrConfiguration, VideoConfiguration};
use crate::capabilities::CapabilitySet;
use crate::config::CameraPolicy;
use crate::device::Device;
use crate::invariant;
use crate::preferences::PreferenceSnapshot;
use crate::types::{CaptureMode, CaptureTechnique, DynamicRange, FrameRate, VideoQuality};
use std::sync::Arc;

/// Build the configuration a session starts with after selecting `camera` in `mode`
pub fn initial_configuration(
    camera: Arc<Device>,
    mode: CaptureMode,
    preferences: &PreferenceSnapshot,
    policy: &CameraPolicy,
) -> Configuration {
    match mode {
        CaptureMode::Photo => Configuration::Photo(photo(camera, preferences, policy)),
        CaptureMode::Video => Configuration::Video(video(camera, preferences)),
        CaptureMode::Qr => Configuration::Qr(QrConfiguration { camera }),
    }
}

fn photo(
    camera: Arc<Device>,
    preferences: &PreferenceSnapshot,
    policy: &CameraPolicy,
) -> PhotoConfiguration {
    let caps = &camera.capabilities;

    let mut capture_technique = preferences.capture_technique;
    if capture_technique == CaptureTechnique::MinimizeLatency
        && preferences.zero_shutter_lag_enabled
        && caps.zero_shutter_lag_supported
    {
        capture_technique = CaptureTechnique::ZeroShutterLag;
    }

    let high_resolution_enabled =
        policy.high_resolution_enabled_for(&camera.id) && caps.high_resolution_supported;

    PhotoConfiguration {
        effect_mode: preferences.extension_mode,
        capture_technique,
        aspect_ratio: preferences.aspect_ratio,
        high_resolution_enabled,
        camera,
    }
}

fn video(camera: Arc<Device>, preferences: &PreferenceSnapshot) -> VideoConfiguration {
    let caps = &camera.capabilities;
    let context = format!("video configuration for {}", camera);

    let quality = resolve_quality(caps, preferences.video_quality).unwrap_or_else(|| {
        invariant::violation("Camera must support at least one video quality", &context)
    });
    let (frame_rate, dynamic_range) = derive_quality_fields(
        caps,
        quality,
        preferences.video_frame_rate,
        preferences.video_dynamic_range,
        &context,
    );

    let stabilization_enabled =
        preferences.video_stabilization && caps.video_stabilization_supported;

    VideoConfiguration {
        quality,
        frame_rate,
        dynamic_range,
        mirror_mode: preferences.video_mirror_mode,
        stabilization_enabled,
        camera,
    }
}

/// Frame rate and dynamic range for `quality`, preferring the given values.
///
/// Raises an invariant violation when the quality has no dynamic range.
pub(crate) fn derive_quality_fields(
    caps: &CapabilitySet,
    quality: VideoQuality,
    preferred_frame_rate: Option<FrameRate>,
    preferred_dynamic_range: DynamicRange,
    context: &str,
) -> (Option<FrameRate>, DynamicRange) {
    let frame_rate = resolve_frame_rate(caps, quality, preferred_frame_rate);
    let dynamic_range = resolve_dynamic_range(caps, quality, preferred_dynamic_range)
        .unwrap_or_else(|| {
            invariant::violation("Video quality must support a dynamic range", context)
        });
    (frame_rate, dynamic_range)
}

/// Preferred quality if supported, else the first one in device order
pub(crate) fn resolve_quality(
    caps: &CapabilitySet,
    preferred: Option<VideoQuality>,
) -> Option<VideoQuality> {
    preferred
        .filter(|quality| caps.supports_video_quality(*quality))
        .or_else(|| caps.supported_video_qualities().first().copied())
}

/// Preferred frame rate if valid for `quality`, else the first supported one.
///
/// `None` is legitimate: the quality only records at a variable frame rate.
pub(crate) fn resolve_frame_rate(
    caps: &CapabilitySet,
    quality: VideoQuality,
    preferred: Option<FrameRate>,
) -> Option<FrameRate> {
    let supported = caps.frame_rates(quality);
    preferred
        .filter(|rate| supported.contains(rate))
        .or_else(|| supported.first().copied())
}

pub(crate) fn resolve_dynamic_range(
    caps: &CapabilitySet,
    quality: VideoQuality,
    preferred: DynamicRange,
) -> Option<DynamicRange> {
    let supported = caps.dynamic_ranges(quality);
    if supported.contains(&preferred) {
        Some(preferred)
    } else {
        supported.first().copied()
    }
}
