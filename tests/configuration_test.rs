//! Tests for the configuration model: construction, derivation and validation

use camera_session::config::CameraPolicy;
use camera_session::configuration::{
    cycle, initial_configuration, ConfigurationOverrides, ConfigurationVariant,
};
use camera_session::preferences::PreferenceSnapshot;
use camera_session::testing::fixtures;
use camera_session::types::{
    AspectRatio, CaptureMode, CaptureTechnique, DynamicRange, ExtensionMode, FrameRate,
    VideoMirrorMode, VideoQuality,
};
use camera_session::{
    CameraError, Configuration, PhotoConfiguration, QrConfiguration, VideoConfiguration,
};
use std::sync::Arc;

fn video_on_back(preferences: &PreferenceSnapshot) -> VideoConfiguration {
    match initial_configuration(
        fixtures::back_camera(),
        CaptureMode::Video,
        preferences,
        &CameraPolicy::default(),
    ) {
        Configuration::Video(video) => video,
        other => panic!("expected video, got {:?}", other),
    }
}

fn as_video(configuration: Configuration) -> VideoConfiguration {
    match configuration {
        Configuration::Video(video) => video,
        other => panic!("expected video, got {:?}", other),
    }
}

fn as_photo(configuration: Configuration) -> PhotoConfiguration {
    match configuration {
        Configuration::Photo(photo) => photo,
        other => panic!("expected photo, got {:?}", other),
    }
}

fn next_quality(video: &VideoConfiguration, preferred_range: DynamicRange) -> VideoConfiguration {
    as_video(cycle::video_quality(video, Some(FrameRate::Fps60), preferred_range))
}

#[cfg(test)]
mod clone_with_tests {
    use super::*;

    #[test]
    fn test_empty_overrides_keep_everything() {
        let photo = Configuration::Photo(PhotoConfiguration {
            aspect_ratio: AspectRatio::Ratio16x9,
            effect_mode: ExtensionMode::Night,
            ..PhotoConfiguration::new(fixtures::back_camera())
        });
        assert_eq!(photo.clone_with(ConfigurationOverrides::default()), photo);
    }

    #[test]
    fn test_camera_override_keeps_mode_fields() {
        let video = Configuration::Video(VideoConfiguration {
            mirror_mode: VideoMirrorMode::On,
            ..video_on_back(&PreferenceSnapshot::default())
        });
        let front = fixtures::front_camera();

        let moved = as_video(video.clone_with(ConfigurationOverrides::camera(Arc::clone(&front))));
        assert_eq!(moved.camera.id, "1");
        assert_eq!(moved.mirror_mode, VideoMirrorMode::On);
    }

    #[test]
    fn test_mode_change_starts_from_defaults() {
        let photo = Configuration::Photo(PhotoConfiguration {
            aspect_ratio: AspectRatio::Ratio16x9,
            ..PhotoConfiguration::new(fixtures::back_camera())
        });

        let video = photo.clone_with(ConfigurationOverrides::capture_mode(CaptureMode::Video));
        assert_eq!(video.capture_mode(), CaptureMode::Video);
        assert_eq!(video.camera().id, "0");

        let back_to_photo = as_photo(video.clone_with(ConfigurationOverrides {
            capture_mode: Some(CaptureMode::Photo),
            effect_mode: Some(ExtensionMode::Hdr),
            ..ConfigurationOverrides::default()
        }));
        assert_eq!(back_to_photo.aspect_ratio, AspectRatio::default());
        assert_eq!(back_to_photo.effect_mode, ExtensionMode::Hdr);
    }

    #[test]
    fn test_effect_override_ignored_outside_photo() {
        let qr = Configuration::Qr(QrConfiguration {
            camera: fixtures::back_camera(),
        });
        let updated = qr.clone_with(ConfigurationOverrides {
            effect_mode: Some(ExtensionMode::Bokeh),
            ..ConfigurationOverrides::default()
        });
        assert_eq!(updated.effect_mode(), ExtensionMode::None);
    }
}

#[cfg(test)]
mod reconcile_tests {
    use super::*;

    #[test]
    fn test_unsupported_photo_fields_fall_back() {
        let photo = Configuration::Photo(PhotoConfiguration {
            effect_mode: ExtensionMode::Night,
            capture_technique: CaptureTechnique::ZeroShutterLag,
            high_resolution_enabled: true,
            ..PhotoConfiguration::new(fixtures::back_camera())
        });
        let on_front = as_photo(
            photo
                .clone_with(ConfigurationOverrides::camera(fixtures::front_camera()))
                .reconcile(),
        );

        assert_eq!(on_front.effect_mode, ExtensionMode::None);
        assert_eq!(on_front.capture_technique, CaptureTechnique::MinimizeLatency);
        assert!(!on_front.high_resolution_enabled);
    }

    #[test]
    fn test_video_quality_follows_the_new_camera() {
        let uhd = as_video(cycle::video_quality(
            &video_on_back(&PreferenceSnapshot::default()),
            None,
            DynamicRange::Sdr,
        ));
        assert_eq!(uhd.quality, VideoQuality::Uhd);

        let on_front = as_video(
            Configuration::Video(uhd)
                .clone_with(ConfigurationOverrides::camera(fixtures::front_camera()))
                .reconcile(),
        );
        assert_eq!(on_front.quality, VideoQuality::Fhd);
        assert_eq!(on_front.frame_rate, Some(FrameRate::Fps30));
        assert!(!on_front.stabilization_enabled);
        assert!(Configuration::Video(on_front).validate().is_ok());
    }

    #[test]
    fn test_reconciled_configurations_validate() {
        let preferences = PreferenceSnapshot {
            video_quality: Some(VideoQuality::Uhd),
            video_frame_rate: Some(FrameRate::Fps60),
            video_dynamic_range: DynamicRange::Hlg10Bit,
            ..PreferenceSnapshot::default()
        };
        for camera in [fixtures::back_camera(), fixtures::front_camera()] {
            for mode in [CaptureMode::Photo, CaptureMode::Video, CaptureMode::Qr] {
                let configuration = initial_configuration(
                    Arc::clone(&camera),
                    mode,
                    &preferences,
                    &CameraPolicy::default(),
                )
                .reconcile();
                assert!(
                    configuration.validate().is_ok(),
                    "{:?} on {} did not validate",
                    mode,
                    camera
                );
            }
        }
    }
}

#[cfg(test)]
mod validation_tests {
    use super::*;

    #[test]
    fn test_rejects_unsupported_frame_rate() {
        let video = Configuration::Video(VideoConfiguration {
            quality: VideoQuality::Uhd,
            frame_rate: Some(FrameRate::Fps60),
            ..video_on_back(&PreferenceSnapshot::default())
        });
        match video.validate() {
            Err(CameraError::InvalidConfiguration(message)) => {
                assert!(message.contains("60 fps"), "{}", message)
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_dynamic_range_outside_quality() {
        let video = Configuration::Video(VideoConfiguration {
            quality: VideoQuality::Sd,
            frame_rate: None,
            dynamic_range: DynamicRange::Hlg10Bit,
            ..video_on_back(&PreferenceSnapshot::default())
        });
        assert!(video.validate().is_err());
    }

    #[test]
    fn test_variable_frame_rate_is_valid() {
        let video = Configuration::Video(VideoConfiguration {
            quality: VideoQuality::Sd,
            frame_rate: None,
            dynamic_range: DynamicRange::Sdr,
            ..video_on_back(&PreferenceSnapshot::default())
        });
        assert!(video.validate().is_ok());
    }

    #[test]
    fn test_variant_extraction() {
        let photo = Configuration::Photo(PhotoConfiguration::new(fixtures::back_camera()));
        assert!(PhotoConfiguration::extract(&photo).is_some());
        assert!(VideoConfiguration::extract(&photo).is_none());
        assert!(QrConfiguration::extract(&photo).is_none());
        assert!(Configuration::extract(&photo).is_some());
    }
}

#[cfg(test)]
mod cycle_tests {
    use super::*;

    #[test]
    fn test_quality_cycle_rederives_dependent_fields() {
        let preferences = PreferenceSnapshot {
            video_frame_rate: Some(FrameRate::Fps60),
            ..PreferenceSnapshot::default()
        };
        let fhd = video_on_back(&preferences);
        assert_eq!(fhd.quality, VideoQuality::Fhd);
        assert_eq!(fhd.frame_rate, Some(FrameRate::Fps60));

        let uhd = next_quality(&fhd, DynamicRange::Hlg10Bit);
        assert_eq!(uhd.quality, VideoQuality::Uhd);
        assert_eq!(uhd.frame_rate, Some(FrameRate::Fps30));
        assert_eq!(uhd.dynamic_range, DynamicRange::Hlg10Bit);

        let sd = next_quality(&uhd, DynamicRange::Hlg10Bit);
        assert_eq!(sd.quality, VideoQuality::Sd);
        assert_eq!(sd.frame_rate, None);
        assert_eq!(sd.dynamic_range, DynamicRange::Sdr);

        let wrapped = next_quality(&sd, DynamicRange::Sdr);
        assert_eq!(wrapped.quality, VideoQuality::Fhd);
        assert_eq!(wrapped.frame_rate, Some(FrameRate::Fps60));
    }

    #[test]
    fn test_frame_rate_cycle_wraps_within_quality() {
        let fhd = video_on_back(&PreferenceSnapshot::default());
        assert_eq!(fhd.frame_rate, Some(FrameRate::Fps24));

        let rates: Vec<Option<FrameRate>> = std::iter::successors(Some(fhd), |video| {
            Some(as_video(cycle::frame_rate(video)))
        })
        .skip(1)
        .take(3)
        .map(|video| video.frame_rate)
        .collect();
        assert_eq!(
            rates,
            vec![
                Some(FrameRate::Fps30),
                Some(FrameRate::Fps60),
                Some(FrameRate::Fps24)
            ]
        );
    }

    #[test]
    fn test_frame_rate_cycle_on_variable_rate_quality_is_identity() {
        let sd = VideoConfiguration {
            quality: VideoQuality::Sd,
            frame_rate: None,
            ..video_on_back(&PreferenceSnapshot::default())
        };
        assert_eq!(cycle::frame_rate(&sd), Configuration::Video(sd));
    }

    #[test]
    fn test_photo_cycles() {
        let photo = PhotoConfiguration::new(fixtures::back_camera());
        let ratio = as_photo(cycle::aspect_ratio(&photo));
        assert_eq!(ratio.aspect_ratio, AspectRatio::Ratio16x9);
        assert_eq!(as_photo(cycle::aspect_ratio(&ratio)).aspect_ratio, AspectRatio::Ratio4x3);

        let effects: Vec<ExtensionMode> = std::iter::successors(Some(photo.clone()), |p| {
            Some(as_photo(cycle::extension_mode(p)))
        })
        .skip(1)
        .take(4)
        .map(|p| p.effect_mode)
        .collect();
        assert_eq!(
            effects,
            vec![
                ExtensionMode::Bokeh,
                ExtensionMode::Hdr,
                ExtensionMode::Night,
                ExtensionMode::None
            ]
        );

        let front = PhotoConfiguration::new(fixtures::front_camera());
        assert!(!as_photo(cycle::high_resolution(&front)).high_resolution_enabled);
        assert!(as_photo(cycle::high_resolution(&photo)).high_resolution_enabled);
    }

    #[test]
    fn test_mirror_mode_cycle() {
        let video = video_on_back(&PreferenceSnapshot::default());
        assert_eq!(video.mirror_mode, VideoMirrorMode::OnFrontOnly);
        assert!(!video.is_mirrored());

        let off = as_video(cycle::video_mirror_mode(&video));
        assert_eq!(off.mirror_mode, VideoMirrorMode::Off);
        let on = as_video(cycle::video_mirror_mode(&off));
        assert!(on.is_mirrored());
    }
}
