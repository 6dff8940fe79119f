//! Derived live views
//!
//! Everything the viewfinder shows besides the configuration itself is a
//! pure function of the bound configuration, the preference snapshot and the
//! environment. The coordinator recomputes [`LiveViews`] whenever one of the
//! three changes.

use crate::capabilities::CapabilitySet;
use crate::configuration::Configuration;
use crate::environment::{EnvironmentSnapshot, ThermalStatus};
use crate::invariant;
use crate::preferences::PreferenceSnapshot;
use crate::types::{
    next_in_cycle, CaptureMode, DynamicRange, ExtensionMode, FlashMode, FrameRate, GridMode,
    TimerMode, VideoQuality,
};
use serde::Serialize;

/// Battery level at or below which the low battery indicator is shown
pub const LOW_BATTERY_LEVEL: u8 = 15;

/// Thermal status from which a warning is shown
pub const THERMAL_WARNING_STATUS: ThermalStatus = ThermalStatus::Severe;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveViews {
    pub supported_flash_modes: Vec<FlashMode>,
    pub flash_mode: FlashMode,
    pub grid_mode: GridMode,
    pub timer_mode: TimerMode,
    pub zoom_ratio_presets: Vec<f32>,
    pub supported_extension_modes: Vec<ExtensionMode>,
    pub supported_video_qualities: Vec<VideoQuality>,
    pub supported_frame_rates: Vec<FrameRate>,
    pub supported_dynamic_ranges: Vec<DynamicRange>,
    pub mirrored: bool,
    pub thermal_warning: bool,
    pub low_battery: bool,
    pub location_tagging: bool,
}

/// Flash modes offered in a capture mode, in cycling order
pub fn supported_flash_modes(mode: CaptureMode, capabilities: &CapabilitySet) -> Vec<FlashMode> {
    let mut modes: Vec<FlashMode> = mode
        .allowed_flash_modes()
        .iter()
        .copied()
        .filter(|flash| capabilities.supports_flash_mode(*flash))
        .collect();
    modes.sort();
    modes
}

/// Successor of the wanted flash mode in the supported list
pub fn next_flash_mode(supported: &[FlashMode], current: FlashMode) -> FlashMode {
    next_in_cycle(supported, &current).unwrap_or_else(|| {
        invariant::violation("Camera must support at least one flash mode", "flash mode")
    })
}

/// Flash mode to apply to the hardware.
///
/// The wanted mode for the capture mode if supported, otherwise off. Force
/// torch overrides it in photo mode when the camera has a torch.
pub fn effective_flash_mode(
    mode: CaptureMode,
    supported: &[FlashMode],
    preferences: &PreferenceSnapshot,
) -> FlashMode {
    if mode == CaptureMode::Photo
        && preferences.force_torch
        && supported.contains(&FlashMode::Torch)
    {
        return FlashMode::Torch;
    }

    let wanted = preferences.flash_mode_for(mode);
    if supported.contains(&wanted) {
        wanted
    } else {
        FlashMode::Off
    }
}

/// Discrete zoom ratios offered as quick presets
pub fn zoom_ratio_presets(capabilities: &CapabilitySet) -> Vec<f32> {
    if capabilities.logical_zoom_ratios.is_empty() {
        return vec![1.0];
    }
    capabilities
        .logical_zoom_ratios
        .iter()
        .map(|(ratio, _)| *ratio)
        .collect()
}

pub fn compute(
    configuration: &Configuration,
    preferences: &PreferenceSnapshot,
    environment: &EnvironmentSnapshot,
) -> LiveViews {
    let mode = configuration.capture_mode();
    let caps = configuration.capabilities();
    let supported_flash_modes = supported_flash_modes(mode, caps);
    let flash_mode = effective_flash_mode(mode, &supported_flash_modes, preferences);

    let (supported_extension_modes, supported_video_qualities, frame_rates, dynamic_ranges) =
        match configuration {
            Configuration::Photo(_) => (
                caps.extension_modes.iter().copied().collect(),
                Vec::new(),
                Vec::new(),
                Vec::new(),
            ),
            Configuration::Video(video) => (
                Vec::new(),
                caps.supported_video_qualities(),
                caps.frame_rates(video.quality),
                caps.dynamic_ranges(video.quality),
            ),
            Configuration::Qr(_) => (Vec::new(), Vec::new(), Vec::new(), Vec::new()),
        };

    LiveViews {
        supported_flash_modes,
        flash_mode,
        grid_mode: preferences.grid_mode,
        timer_mode: preferences.timer_mode,
        zoom_ratio_presets: zoom_ratio_presets(caps),
        supported_extension_modes,
        supported_video_qualities,
        supported_frame_rates: frame_rates,
        supported_dynamic_ranges: dynamic_ranges,
        mirrored: configuration.is_mirrored(),
        thermal_warning: environment.thermal >= THERMAL_WARNING_STATUS,
        low_battery: environment.battery.level <= LOW_BATTERY_LEVEL
            && !environment.battery.charging,
        location_tagging: preferences.save_location && environment.location.is_some(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::{PhotoConfiguration, VideoConfiguration};
    use crate::environment::{BatteryState, Location};
    use crate::testing::fixtures;

    fn photo_on(camera: std::sync::Arc<crate::device::Device>) -> Configuration {
        Configuration::Photo(PhotoConfiguration::new(camera))
    }

    #[test]
    fn test_flash_modes_intersect_mode_and_device() {
        let back = fixtures::back_camera();
        assert_eq!(
            supported_flash_modes(CaptureMode::Photo, &back.capabilities),
            vec![FlashMode::Off, FlashMode::Auto, FlashMode::On, FlashMode::Torch]
        );
        assert_eq!(
            supported_flash_modes(CaptureMode::Video, &back.capabilities),
            vec![FlashMode::Off, FlashMode::Torch]
        );

        let front = fixtures::front_camera();
        assert_eq!(
            supported_flash_modes(CaptureMode::Photo, &front.capabilities),
            vec![FlashMode::Off, FlashMode::Screen]
        );
        assert_eq!(
            supported_flash_modes(CaptureMode::Qr, &front.capabilities),
            vec![FlashMode::Off]
        );
    }

    #[test]
    fn test_flash_cycle_order() {
        let supported = [FlashMode::Off, FlashMode::Auto, FlashMode::On];
        assert_eq!(next_flash_mode(&supported, FlashMode::Off), FlashMode::Auto);
        assert_eq!(next_flash_mode(&supported, FlashMode::Auto), FlashMode::On);
        assert_eq!(next_flash_mode(&supported, FlashMode::On), FlashMode::Off);
        assert_eq!(next_flash_mode(&supported, FlashMode::Screen), FlashMode::Off);
    }

    #[test]
    fn test_unsupported_wanted_flash_falls_back_to_off() {
        let preferences = PreferenceSnapshot {
            video_flash_mode: FlashMode::Auto,
            ..PreferenceSnapshot::default()
        };
        let supported = [FlashMode::Off, FlashMode::Torch];
        assert_eq!(
            effective_flash_mode(CaptureMode::Video, &supported, &preferences),
            FlashMode::Off
        );
    }

    #[test]
    fn test_force_torch_only_in_photo_mode() {
        let preferences = PreferenceSnapshot {
            force_torch: true,
            photo_flash_mode: FlashMode::Auto,
            ..PreferenceSnapshot::default()
        };
        let supported = [FlashMode::Off, FlashMode::Auto, FlashMode::On, FlashMode::Torch];
        assert_eq!(
            effective_flash_mode(CaptureMode::Photo, &supported, &preferences),
            FlashMode::Torch
        );
        assert_eq!(
            effective_flash_mode(
                CaptureMode::Photo,
                &[FlashMode::Off, FlashMode::Auto],
                &preferences
            ),
            FlashMode::Auto
        );
        assert_eq!(
            effective_flash_mode(CaptureMode::Video, &supported, &preferences),
            FlashMode::Off
        );
    }

    #[test]
    fn test_zoom_presets_default_to_unity() {
        assert_eq!(
            zoom_ratio_presets(&fixtures::back_camera().capabilities),
            vec![0.6, 1.0, 2.0, 5.0]
        );
        assert_eq!(zoom_ratio_presets(&fixtures::front_camera().capabilities), vec![1.0]);
    }

    #[test]
    fn test_video_lists_follow_quality() {
        let camera = fixtures::back_camera();
        let config = Configuration::Video(VideoConfiguration {
            quality: VideoQuality::Uhd,
            frame_rate: Some(FrameRate::Fps30),
            ..VideoConfiguration::new(camera)
        });
        let views = compute(
            &config,
            &PreferenceSnapshot::default(),
            &EnvironmentSnapshot::default(),
        );
        assert_eq!(views.supported_frame_rates, vec![FrameRate::Fps30]);
        assert_eq!(
            views.supported_dynamic_ranges,
            vec![DynamicRange::Sdr, DynamicRange::Hlg10Bit]
        );
        assert!(views.supported_extension_modes.is_empty());
    }

    #[test]
    fn test_environment_indicators() {
        let config = photo_on(fixtures::back_camera());
        let preferences = PreferenceSnapshot {
            save_location: true,
            ..PreferenceSnapshot::default()
        };

        let calm = compute(&config, &preferences, &EnvironmentSnapshot::default());
        assert!(!calm.thermal_warning);
        assert!(!calm.low_battery);
        assert!(!calm.location_tagging);

        let environment = EnvironmentSnapshot {
            thermal: ThermalStatus::Severe,
            battery: BatteryState {
                level: 15,
                charging: false,
            },
            location: Some(Location {
                latitude: 48.85,
                longitude: 2.35,
                altitude: None,
                accuracy_m: Some(12.0),
            }),
            ..EnvironmentSnapshot::default()
        };
        let stressed = compute(&config, &preferences, &environment);
        assert!(stressed.thermal_warning);
        assert!(stressed.low_battery);
        assert!(stressed.location_tagging);

        let charging = EnvironmentSnapshot {
            battery: BatteryState {
                level: 5,
                charging: true,
            },
            thermal: ThermalStatus::Moderate,
            ..environment
        };
        let views = compute(&config, &preferences, &charging);
        assert!(!views.low_battery);
        assert!(!views.thermal_warning);
    }
}
