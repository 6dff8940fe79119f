//! Tests for capability composition from raw reports and the policy overlay

use camera_session::capabilities::{EdgeMode, NoiseReductionMode, TuningContext};
use camera_session::config::{CameraPolicy, FrameRateOverride, LogicalZoomRatio, OverrideAction};
use camera_session::platform::DeviceDescriptor;
use camera_session::preferences::PreferenceSnapshot;
use camera_session::testing::fixtures;
use camera_session::types::{
    DynamicRange, ExtensionMode, Facing, FlashMode, FrameRate, VideoQuality,
};
use camera_session::CapabilitySet;

fn back_capabilities(policy: &CameraPolicy) -> CapabilitySet {
    CapabilitySet::from_report(
        &DeviceDescriptor::new("0", Facing::Back),
        &fixtures::back_report(),
        policy,
    )
}

fn frame_rate_override(
    quality: VideoQuality,
    frame_rate: u32,
    action: OverrideAction,
) -> FrameRateOverride {
    FrameRateOverride {
        camera_id: "0".to_string(),
        quality,
        frame_rate,
        action,
    }
}

#[cfg(test)]
mod video_tests {
    use super::*;

    #[test]
    fn test_qualities_keep_device_order() {
        let caps = back_capabilities(&CameraPolicy::default());
        assert_eq!(
            caps.supported_video_qualities(),
            vec![VideoQuality::Fhd, VideoQuality::Uhd, VideoQuality::Sd]
        );
    }

    #[test]
    fn test_frame_rates_need_sensor_and_profile_support() {
        let caps = back_capabilities(&CameraPolicy::default());
        assert_eq!(
            caps.frame_rates(VideoQuality::Fhd),
            vec![FrameRate::Fps24, FrameRate::Fps30, FrameRate::Fps60]
        );
        assert_eq!(caps.frame_rates(VideoQuality::Uhd), vec![FrameRate::Fps30]);
        // 15-25 fps maps to no fixed rate: variable frame rate only
        assert!(caps.frame_rates(VideoQuality::Sd).is_empty());
        assert!(caps.frame_rates(VideoQuality::Hd).is_empty());
    }

    #[test]
    fn test_dynamic_ranges_need_encoder_support() {
        let caps = back_capabilities(&CameraPolicy::default());
        assert_eq!(
            caps.dynamic_ranges(VideoQuality::Fhd),
            vec![DynamicRange::Sdr, DynamicRange::Hlg10Bit]
        );
        assert_eq!(caps.dynamic_ranges(VideoQuality::Sd), vec![DynamicRange::Sdr]);
    }

    #[test]
    fn test_overrides_apply_in_list_order() {
        let policy = CameraPolicy {
            frame_rate_overrides: vec![
                frame_rate_override(VideoQuality::Fhd, 120, OverrideAction::Add),
                frame_rate_override(VideoQuality::Fhd, 24, OverrideAction::Remove),
                frame_rate_override(VideoQuality::Uhd, 60, OverrideAction::Add),
                frame_rate_override(VideoQuality::Uhd, 60, OverrideAction::Remove),
            ],
            ..CameraPolicy::default()
        };
        let caps = back_capabilities(&policy);

        assert_eq!(
            caps.frame_rates(VideoQuality::Fhd),
            vec![FrameRate::Fps30, FrameRate::Fps60, FrameRate::Fps120]
        );
        assert_eq!(caps.frame_rates(VideoQuality::Uhd), vec![FrameRate::Fps30]);
    }

    #[test]
    fn test_overrides_for_other_cameras_are_ignored() {
        let policy = CameraPolicy {
            frame_rate_overrides: vec![FrameRateOverride {
                camera_id: "1".to_string(),
                ..frame_rate_override(VideoQuality::Fhd, 30, OverrideAction::Remove)
            }],
            ..CameraPolicy::default()
        };
        let caps = back_capabilities(&policy);
        assert!(caps.frame_rates(VideoQuality::Fhd).contains(&FrameRate::Fps30));
    }

    #[test]
    fn test_added_quality_without_dynamic_range_is_dropped() {
        let policy = CameraPolicy {
            frame_rate_overrides: vec![frame_rate_override(
                VideoQuality::Hd,
                30,
                OverrideAction::Add,
            )],
            ..CameraPolicy::default()
        };
        let caps = back_capabilities(&policy);
        assert!(!caps.supports_video_quality(VideoQuality::Hd));
        assert_eq!(caps.supported_video_qualities().len(), 3);
    }

    #[test]
    fn test_every_listed_quality_has_a_dynamic_range() {
        for device in [fixtures::back_camera(), fixtures::front_camera()] {
            for quality in device.capabilities.supported_video_qualities() {
                assert!(
                    !device.capabilities.dynamic_ranges(quality).is_empty(),
                    "{} lists {:?} without dynamic range",
                    device,
                    quality
                );
            }
        }
    }
}

#[cfg(test)]
mod photo_tests {
    use super::*;

    #[test]
    fn test_extension_none_always_present() {
        let caps = back_capabilities(&CameraPolicy::default());
        assert_eq!(
            caps.extension_modes.iter().copied().collect::<Vec<_>>(),
            vec![
                ExtensionMode::None,
                ExtensionMode::Bokeh,
                ExtensionMode::Hdr,
                ExtensionMode::Night
            ]
        );

        let front = fixtures::front_camera();
        assert_eq!(
            front.capabilities.extension_modes.iter().copied().collect::<Vec<_>>(),
            vec![ExtensionMode::None]
        );
    }

    #[test]
    fn test_flash_modes_follow_flash_unit_and_facing() {
        let back = fixtures::back_camera();
        assert!(back.capabilities.supports_flash_mode(FlashMode::Auto));
        assert!(!back.capabilities.supports_flash_mode(FlashMode::Screen));

        let front = fixtures::front_camera();
        assert!(front.capabilities.supports_flash_mode(FlashMode::Screen));
        assert!(!front.capabilities.supports_flash_mode(FlashMode::Torch));

        let usb = fixtures::camera_without_video();
        assert_eq!(
            usb.capabilities.flash_modes.iter().copied().collect::<Vec<_>>(),
            vec![FlashMode::Off]
        );
    }

    #[test]
    fn test_logical_zoom_table_and_clamping() {
        let caps = back_capabilities(&fixtures::reference_policy());
        assert_eq!(caps.effective_zoom_ratio(2.0), 2.2);
        assert_eq!(caps.effective_zoom_ratio(3.0), 3.0);
        assert_eq!(caps.clamp_zoom_ratio(0.1), 0.6);
        assert_eq!(caps.clamp_zoom_ratio(25.0), 10.0);
        assert_eq!(caps.clamp_exposure_compensation(-40), -12);
    }

    #[test]
    fn test_duplicate_zoom_keys_keep_the_first_entry() {
        let zoom = |ratio: f32, effective_ratio: f32| LogicalZoomRatio {
            camera_id: "0".to_string(),
            ratio,
            effective_ratio,
        };
        let policy = CameraPolicy {
            logical_zoom_ratios: vec![zoom(2.0, 2.2), zoom(1.0, 1.0), zoom(2.0, 1.9)],
            ..CameraPolicy::default()
        };
        let caps = back_capabilities(&policy);
        assert_eq!(caps.logical_zoom_ratios, vec![(1.0, 1.0), (2.0, 2.2)]);
    }
}

#[cfg(test)]
mod sensor_tuning_tests {
    use super::*;

    #[test]
    fn test_tuning_follows_preferences_and_context() {
        let caps = back_capabilities(&CameraPolicy::default());
        let preferences = PreferenceSnapshot {
            edge_mode: Some(EdgeMode::HighQuality),
            noise_reduction_mode: Some(NoiseReductionMode::Minimal),
            ..PreferenceSnapshot::default()
        };

        let photo = caps.resolve_sensor_tuning(&preferences, TuningContext::Photo);
        assert_eq!(photo.edge, Some(EdgeMode::HighQuality));
        assert_eq!(photo.noise_reduction, Some(NoiseReductionMode::Minimal));

        let zsl = caps.resolve_sensor_tuning(&preferences, TuningContext::ZeroShutterLag);
        assert_eq!(zsl.edge, None);

        let video = caps.resolve_sensor_tuning(&preferences, TuningContext::Video);
        assert_eq!(video.edge, None);
        assert_eq!(video.noise_reduction, Some(NoiseReductionMode::Minimal));
    }

    #[test]
    fn test_unsupported_tuning_is_left_to_the_driver() {
        let front = fixtures::front_camera();
        let preferences = PreferenceSnapshot {
            edge_mode: Some(EdgeMode::HighQuality),
            ..PreferenceSnapshot::default()
        };
        let tuning = front
            .capabilities
            .resolve_sensor_tuning(&preferences, TuningContext::Photo);
        assert_eq!(tuning.edge, None);
        assert_eq!(tuning.shading, None);
    }
}

#[cfg(test)]
mod contract_tests {
    use super::*;
    use camera_session::invariant::{clear_checked_invariants, contract_test};

    #[test]
    fn test_composition_checks_its_invariants() {
        clear_checked_invariants();
        back_capabilities(&fixtures::reference_policy());
        contract_test(
            "capability composition",
            &[
                "Video qualities are listed once",
                "Every supported video quality has a dynamic range",
                "Extension mode NONE is always supported",
                "Logical zoom ratios are sorted by key",
                "Exposure compensation range is ordered",
            ],
        );
    }
}
