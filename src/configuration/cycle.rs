//! "Cycle to next value" transforms
//!
//! Each function is a pure transform from the current variant to the next
//! configuration, suitable for `SessionCoordinator::update_configuration`.
//! An empty support list on an axis means the configuration does not belong
//! to its camera and is reported as an invariant violation. Frame rate is the
//! exception: a quality with no fixed frame rate records at a variable rate,
//! and cycling it leaves the configuration untouched.

use super::{factory, Configuration, PhotoConfiguration, VideoConfiguration};
use crate::invariant;
use crate::types::{next_in_cycle, AspectRatio, DynamicRange, FrameRate, VideoMirrorMode};

fn next_or_violation<T: PartialEq + Copy>(values: &[T], current: &T, axis: &str) -> T {
    next_in_cycle(values, current).unwrap_or_else(|| {
        invariant::violation(
            "Configuration axis must have at least one supported value",
            axis,
        )
    })
}

/// Toggle between 4:3 and 16:9
pub fn aspect_ratio(photo: &PhotoConfiguration) -> Configuration {
    let aspect_ratio = next_or_violation(&AspectRatio::CYCLE, &photo.aspect_ratio, "aspect ratio");
    Configuration::Photo(PhotoConfiguration {
        aspect_ratio,
        ..photo.clone()
    })
}

/// Next supported extension mode in sorted order
pub fn extension_mode(photo: &PhotoConfiguration) -> Configuration {
    let supported: Vec<_> = photo
        .camera
        .capabilities
        .extension_modes
        .iter()
        .copied()
        .collect();
    Configuration::Photo(PhotoConfiguration {
        effect_mode: next_or_violation(&supported, &photo.effect_mode, "extension mode"),
        ..photo.clone()
    })
}

pub fn high_resolution(photo: &PhotoConfiguration) -> Configuration {
    Configuration::Photo(PhotoConfiguration {
        high_resolution_enabled: !photo.high_resolution_enabled
            && photo.camera.capabilities.high_resolution_supported,
        ..photo.clone()
    })
}

/// Next quality in device order; frame rate and dynamic range are re-derived
/// for the new quality, preferring the given values
pub fn video_quality(
    video: &VideoConfiguration,
    preferred_frame_rate: Option<FrameRate>,
    preferred_dynamic_range: DynamicRange,
) -> Configuration {
    let caps = &video.camera.capabilities;
    let quality = next_or_violation(
        &caps.supported_video_qualities(),
        &video.quality,
        "video quality",
    );
    let (frame_rate, dynamic_range) = factory::derive_quality_fields(
        caps,
        quality,
        preferred_frame_rate,
        preferred_dynamic_range,
        "video quality",
    );

    Configuration::Video(VideoConfiguration {
        quality,
        frame_rate,
        dynamic_range,
        ..video.clone()
    })
}

/// Next frame rate of the current quality in sorted order
pub fn frame_rate(video: &VideoConfiguration) -> Configuration {
    let supported = video.camera.capabilities.frame_rates(video.quality);
    let Some(current) = video.frame_rate.or_else(|| supported.last().copied()) else {
        log::debug!("{:?} records at a variable frame rate, nothing to cycle", video.quality);
        return Configuration::Video(video.clone());
    };

    Configuration::Video(VideoConfiguration {
        frame_rate: next_in_cycle(&supported, &current),
        ..video.clone()
    })
}

/// Next dynamic range of the current quality in sorted order
pub fn dynamic_range(video: &VideoConfiguration) -> Configuration {
    let supported = video.camera.capabilities.dynamic_ranges(video.quality);
    Configuration::Video(VideoConfiguration {
        dynamic_range: next_or_violation(&supported, &video.dynamic_range, "dynamic range"),
        ..video.clone()
    })
}

pub fn video_mirror_mode(video: &VideoConfiguration) -> Configuration {
    let mirror_mode =
        next_or_violation(&VideoMirrorMode::CYCLE, &video.mirror_mode, "mirror mode");
    Configuration::Video(VideoConfiguration {
        mirror_mode,
        ..video.clone()
    })
}

pub fn video_stabilization(video: &VideoConfiguration) -> Configuration {
    Configuration::Video(VideoConfiguration {
        stabilization_enabled: !video.stabilization_enabled
            && video.camera.capabilities.video_stabilization_supported,
        ..video.clone()
    })
}
