//! Per-device capability model
//!
//! A [`CapabilitySet`] is built once from a raw [`CapabilityReport`] plus the
//! policy overlay and never changes afterwards. It answers the support
//! queries the configuration model and the session views depend on.

pub mod sensor;
pub mod video;

pub use sensor::{
    ColorCorrectionAberrationMode, DistortionCorrectionMode, EdgeMode, HotPixelMode,
    NoiseReductionMode, SensorMode, SensorTuning, ShadingMode, TuningContext,
};
pub use video::VideoQualityInfo;

use crate::assert_invariant;
use crate::config::CameraPolicy;
use crate::platform::{CapabilityReport, DeviceDescriptor};
use crate::preferences::PreferenceSnapshot;
use crate::types::{DynamicRange, ExtensionMode, Facing, FlashMode, FrameRate, VideoQuality};
use serde::Serialize;
use std::collections::BTreeSet;

/// Immutable description of everything one device can do
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapabilitySet {
    pub flash_modes: BTreeSet<FlashMode>,
    pub extension_modes: BTreeSet<ExtensionMode>,
    pub edge_modes: BTreeSet<EdgeMode>,
    pub noise_reduction_modes: BTreeSet<NoiseReductionMode>,
    pub shading_modes: BTreeSet<ShadingMode>,
    pub color_correction_aberration_modes: BTreeSet<ColorCorrectionAberrationMode>,
    pub distortion_correction_modes: BTreeSet<DistortionCorrectionMode>,
    pub hot_pixel_modes: BTreeSet<HotPixelMode>,
    /// Supported qualities in device-declared order
    pub video_qualities: Vec<VideoQualityInfo>,
    /// Discrete zoom ratio to effective zoom ratio, sorted by key
    pub logical_zoom_ratios: Vec<(f32, f32)>,
    pub zoom_ratio_range: (f32, f32),
    pub exposure_compensation_range: (i32, i32),
    pub exposure_compensation_step: f32,
    pub video_stabilization_supported: bool,
    pub zero_shutter_lag_supported: bool,
    pub high_resolution_supported: bool,
}

impl CapabilitySet {
    /// Build the capability set of `device` from its raw report and the overlay
    pub fn from_report(
        device: &DeviceDescriptor,
        report: &CapabilityReport,
        policy: &CameraPolicy,
    ) -> Self {
        let frame_rates = video::apply_frame_rate_overrides(
            video::base_frame_rates(&report.sensor_fps_ranges, &report.video_profiles),
            policy.frame_rate_overrides_for(&device.id),
        );
        let dynamic_ranges =
            video::dynamic_ranges(&report.encoder_dynamic_ranges, &report.video_profiles);

        let mut extension_modes: BTreeSet<ExtensionMode> = report
            .extension_modes
            .iter()
            .filter_map(|&raw| {
                let mode = ExtensionMode::from_raw(raw);
                if mode.is_none() {
                    log::debug!("Ignoring unknown extension mode {} on camera {}", raw, device.id);
                }
                mode
            })
            .collect();
        extension_modes.insert(ExtensionMode::None);

        let (min_zoom, max_zoom) = report.zoom_ratio_range;

        let capabilities = Self {
            flash_modes: flash_modes(report.has_flash_unit, device.facing),
            extension_modes,
            edge_modes: sensor::parse_modes(&report.edge_modes),
            noise_reduction_modes: sensor::parse_modes(&report.noise_reduction_modes),
            shading_modes: sensor::parse_modes(&report.shading_modes),
            color_correction_aberration_modes: sensor::parse_modes(
                &report.color_correction_aberration_modes,
            ),
            distortion_correction_modes: sensor::parse_modes(&report.distortion_correction_modes),
            hot_pixel_modes: sensor::parse_modes(&report.hot_pixel_modes),
            video_qualities: video::compose(frame_rates, dynamic_ranges),
            logical_zoom_ratios: policy.logical_zoom_ratios_for(&device.id),
            zoom_ratio_range: (min_zoom.min(max_zoom), max_zoom.max(min_zoom)),
            exposure_compensation_range: report.exposure_compensation_range,
            exposure_compensation_step: report.exposure_compensation_step,
            video_stabilization_supported: report.video_stabilization_supported,
            zero_shutter_lag_supported: report.zero_shutter_lag_supported,
            high_resolution_supported: report.high_resolution_supported,
        };

        capabilities.validate(&device.id);
        capabilities
    }

    /// Check internal consistency; any failure is a driver or composition bug
    pub fn validate(&self, camera_id: &str) {
        let context = format!("capabilities of camera {camera_id}");

        let mut seen = BTreeSet::new();
        for info in &self.video_qualities {
            assert_invariant!(
                seen.insert(info.quality),
                "Video qualities are listed once",
                &context
            );
            assert_invariant!(
                !info.dynamic_ranges.is_empty(),
                "Every supported video quality has a dynamic range",
                &context
            );
        }

        assert_invariant!(
            self.extension_modes.contains(&ExtensionMode::None),
            "Extension mode NONE is always supported",
            &context
        );
        assert_invariant!(
            self.logical_zoom_ratios
                .windows(2)
                .all(|pair| pair[0].0 < pair[1].0),
            "Logical zoom ratios are sorted by key",
            &context
        );
        assert_invariant!(
            self.exposure_compensation_range.0 <= self.exposure_compensation_range.1,
            "Exposure compensation range is ordered",
            &context
        );
    }

    pub fn supported_video_qualities(&self) -> Vec<VideoQuality> {
        self.video_qualities.iter().map(|info| info.quality).collect()
    }

    pub fn video_quality_info(&self, quality: VideoQuality) -> Option<&VideoQualityInfo> {
        self.video_qualities.iter().find(|info| info.quality == quality)
    }

    pub fn supports_video_quality(&self, quality: VideoQuality) -> bool {
        self.video_quality_info(quality).is_some()
    }

    /// Sorted frame rates for `quality`; empty when unknown or variable-rate only
    pub fn frame_rates(&self, quality: VideoQuality) -> Vec<FrameRate> {
        self.video_quality_info(quality)
            .map(|info| info.frame_rates.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Sorted dynamic ranges for `quality`
    pub fn dynamic_ranges(&self, quality: VideoQuality) -> Vec<DynamicRange> {
        self.video_quality_info(quality)
            .map(|info| info.dynamic_ranges.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn supports_flash_mode(&self, mode: FlashMode) -> bool {
        self.flash_modes.contains(&mode)
    }

    pub fn supports_extension_mode(&self, mode: ExtensionMode) -> bool {
        self.extension_modes.contains(&mode)
    }

    /// Effective zoom ratio for a discrete ratio, falling back to the ratio itself
    pub fn effective_zoom_ratio(&self, ratio: f32) -> f32 {
        self.logical_zoom_ratios
            .iter()
            .find(|(key, _)| (*key - ratio).abs() < f32::EPSILON)
            .map(|(_, effective)| *effective)
            .unwrap_or(ratio)
    }

    pub fn clamp_zoom_ratio(&self, ratio: f32) -> f32 {
        let (min, max) = self.zoom_ratio_range;
        ratio.clamp(min, max)
    }

    pub fn clamp_exposure_compensation(&self, index: i32) -> i32 {
        let (min, max) = self.exposure_compensation_range;
        index.clamp(min, max)
    }

    /// Resolve the user's sensor tuning preferences against support and technique
    pub fn resolve_sensor_tuning(
        &self,
        preferences: &PreferenceSnapshot,
        context: TuningContext,
    ) -> SensorTuning {
        SensorTuning {
            edge: sensor::resolve_mode(preferences.edge_mode, &self.edge_modes, context),
            noise_reduction: sensor::resolve_mode(
                preferences.noise_reduction_mode,
                &self.noise_reduction_modes,
                context,
            ),
            shading: sensor::resolve_mode(preferences.shading_mode, &self.shading_modes, context),
            color_correction_aberration: sensor::resolve_mode(
                preferences.color_correction_aberration_mode,
                &self.color_correction_aberration_modes,
                context,
            ),
            distortion_correction: sensor::resolve_mode(
                preferences.distortion_correction_mode,
                &self.distortion_correction_modes,
                context,
            ),
            hot_pixel: sensor::resolve_mode(
                preferences.hot_pixel_mode,
                &self.hot_pixel_modes,
                context,
            ),
        }
    }
}

/// Flash modes a device offers given its flash unit and facing
fn flash_modes(has_flash_unit: bool, facing: Facing) -> BTreeSet<FlashMode> {
    if has_flash_unit {
        BTreeSet::from([FlashMode::Off, FlashMode::Auto, FlashMode::On, FlashMode::Torch])
    } else if facing == Facing::Front {
        BTreeSet::from([FlashMode::Off, FlashMode::Screen])
    } else {
        BTreeSet::from([FlashMode::Off])
    }
}
