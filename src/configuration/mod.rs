//! Capture configurations
//!
//! A [`Configuration`] is an immutable description of what the hardware is
//! bound to: a camera, a capture mode and the parameters of that mode. The
//! capture mode is the enum discriminant, so a configuration can never claim
//! one mode while carrying the fields of another.

pub mod cycle;
pub mod factory;

pub use factory::initial_configuration;

use crate::capabilities::{CapabilitySet, TuningContext};
use crate::device::Device;
use crate::errors::CameraError;
use crate::types::{
    AspectRatio, CaptureMode, CaptureTechnique, DynamicRange, ExtensionMode, Facing, FrameRate,
    VideoMirrorMode, VideoQuality,
};
use serde::{Serialize, Serializer};
use std::sync::Arc;

fn serialize_camera<S: Serializer>(
    camera: &Arc<Device>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&camera.id)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhotoConfiguration {
    #[serde(serialize_with = "serialize_camera")]
    pub camera: Arc<Device>,
    pub effect_mode: ExtensionMode,
    pub capture_technique: CaptureTechnique,
    pub aspect_ratio: AspectRatio,
    pub high_resolution_enabled: bool,
}

impl PhotoConfiguration {
    pub fn new(camera: Arc<Device>) -> Self {
        Self {
            camera,
            effect_mode: ExtensionMode::None,
            capture_technique: CaptureTechnique::default(),
            aspect_ratio: AspectRatio::default(),
            high_resolution_enabled: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoConfiguration {
    #[serde(serialize_with = "serialize_camera")]
    pub camera: Arc<Device>,
    pub quality: VideoQuality,
    /// `None` records at a variable frame rate
    pub frame_rate: Option<FrameRate>,
    pub dynamic_range: DynamicRange,
    pub mirror_mode: VideoMirrorMode,
    pub stabilization_enabled: bool,
}

impl VideoConfiguration {
    pub fn new(camera: Arc<Device>) -> Self {
        Self {
            camera,
            quality: VideoQuality::Fhd,
            frame_rate: None,
            dynamic_range: DynamicRange::Sdr,
            mirror_mode: VideoMirrorMode::default(),
            stabilization_enabled: false,
        }
    }

    /// Whether recorded frames are flipped horizontally
    pub fn is_mirrored(&self) -> bool {
        match self.mirror_mode {
            VideoMirrorMode::Off => false,
            VideoMirrorMode::On => true,
            VideoMirrorMode::OnFrontOnly => self.camera.facing == Facing::Front,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QrConfiguration {
    #[serde(serialize_with = "serialize_camera")]
    pub camera: Arc<Device>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "capture_mode", rename_all = "snake_case")]
pub enum Configuration {
    Photo(PhotoConfiguration),
    Video(VideoConfiguration),
    Qr(QrConfiguration),
}

/// Base fields that may be replaced by [`Configuration::clone_with`]
#[derive(Debug, Clone, Default)]
pub struct ConfigurationOverrides {
    pub camera: Option<Arc<Device>>,
    pub capture_mode: Option<CaptureMode>,
    /// Only honoured by photo configurations
    pub effect_mode: Option<ExtensionMode>,
}

impl ConfigurationOverrides {
    pub fn camera(camera: Arc<Device>) -> Self {
        Self {
            camera: Some(camera),
            ..Self::default()
        }
    }

    pub fn capture_mode(mode: CaptureMode) -> Self {
        Self {
            capture_mode: Some(mode),
            ..Self::default()
        }
    }
}

impl Configuration {
    pub fn camera(&self) -> &Arc<Device> {
        match self {
            Configuration::Photo(photo) => &photo.camera,
            Configuration::Video(video) => &video.camera,
            Configuration::Qr(qr) => &qr.camera,
        }
    }

    pub fn capture_mode(&self) -> CaptureMode {
        match self {
            Configuration::Photo(_) => CaptureMode::Photo,
            Configuration::Video(_) => CaptureMode::Video,
            Configuration::Qr(_) => CaptureMode::Qr,
        }
    }

    pub fn effect_mode(&self) -> ExtensionMode {
        match self {
            Configuration::Photo(photo) => photo.effect_mode,
            Configuration::Video(_) | Configuration::Qr(_) => ExtensionMode::None,
        }
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.camera().capabilities
    }

    /// Capture technique that constrains sensor tuning
    pub fn tuning_context(&self) -> TuningContext {
        match self {
            Configuration::Photo(photo)
                if photo.capture_technique == CaptureTechnique::ZeroShutterLag =>
            {
                TuningContext::ZeroShutterLag
            }
            Configuration::Photo(_) | Configuration::Qr(_) => TuningContext::Photo,
            Configuration::Video(_) => TuningContext::Video,
        }
    }

    /// Whether captures from this configuration are mirrored
    pub fn is_mirrored(&self) -> bool {
        match self {
            Configuration::Video(video) => video.is_mirrored(),
            Configuration::Photo(_) | Configuration::Qr(_) => {
                self.camera().facing == Facing::Front
            }
        }
    }

    /// Copy with replaced base fields.
    ///
    /// Within the same capture mode every unspecified field is kept. When the
    /// capture mode changes the mode-specific fields start from defaults.
    pub fn clone_with(&self, overrides: ConfigurationOverrides) -> Configuration {
        let camera = overrides.camera.unwrap_or_else(|| Arc::clone(self.camera()));
        let mode = overrides.capture_mode.unwrap_or_else(|| self.capture_mode());

        match (self, mode) {
            (Configuration::Photo(photo), CaptureMode::Photo) => {
                Configuration::Photo(PhotoConfiguration {
                    camera,
                    effect_mode: overrides.effect_mode.unwrap_or(photo.effect_mode),
                    ..photo.clone()
                })
            }
            (Configuration::Video(video), CaptureMode::Video) => {
                Configuration::Video(VideoConfiguration {
                    camera,
                    ..video.clone()
                })
            }
            (Configuration::Qr(_), CaptureMode::Qr) => Configuration::Qr(QrConfiguration { camera }),
            (_, CaptureMode::Photo) => Configuration::Photo(PhotoConfiguration {
                effect_mode: overrides.effect_mode.unwrap_or_default(),
                ..PhotoConfiguration::new(camera)
            }),
            (_, CaptureMode::Video) => Configuration::Video(VideoConfiguration::new(camera)),
            (_, CaptureMode::Qr) => Configuration::Qr(QrConfiguration { camera }),
        }
    }

    /// Clamp values the bound camera cannot honour to supported ones
    pub fn reconcile(self) -> Configuration {
        match self {
            Configuration::Photo(mut photo) => {
                let caps = &photo.camera.capabilities;
                if !caps.supports_extension_mode(photo.effect_mode) {
                    log::debug!("Effect {:?} unsupported on {}", photo.effect_mode, photo.camera);
                    photo.effect_mode = ExtensionMode::None;
                }
                if photo.capture_technique == CaptureTechnique::ZeroShutterLag
                    && !caps.zero_shutter_lag_supported
                {
                    photo.capture_technique = CaptureTechnique::MinimizeLatency;
                }
                if photo.high_resolution_enabled && !caps.high_resolution_supported {
                    photo.high_resolution_enabled = false;
                }
                Configuration::Photo(photo)
            }
            Configuration::Video(mut video) => {
                let caps = &video.camera.capabilities;
                if let Some(quality) = factory::resolve_quality(caps, Some(video.quality)) {
                    video.quality = quality;
                    video.frame_rate = factory::resolve_frame_rate(caps, quality, video.frame_rate);
                    if let Some(range) =
                        factory::resolve_dynamic_range(caps, quality, video.dynamic_range)
                    {
                        video.dynamic_range = range;
                    }
                }
                if video.stabilization_enabled && !caps.video_stabilization_supported {
                    video.stabilization_enabled = false;
                }
                Configuration::Video(video)
            }
            qr @ Configuration::Qr(_) => qr,
        }
    }

    /// Reject configurations referencing values the camera does not support
    pub fn validate(&self) -> Result<(), CameraError> {
        let caps = self.capabilities();
        let camera = self.camera();

        match self {
            Configuration::Photo(photo) => {
                if !caps.supports_extension_mode(photo.effect_mode) {
                    return Err(invalid(camera, format!("effect {:?}", photo.effect_mode)));
                }
                if photo.capture_technique == CaptureTechnique::ZeroShutterLag
                    && !caps.zero_shutter_lag_supported
                {
                    return Err(invalid(camera, "zero-shutter-lag capture".to_string()));
                }
                if photo.high_resolution_enabled && !caps.high_resolution_supported {
                    return Err(invalid(camera, "high resolution capture".to_string()));
                }
            }
            Configuration::Video(video) => {
                if !caps.supports_video_quality(video.quality) {
                    return Err(invalid(camera, format!("video quality {:?}", video.quality)));
                }
                if let Some(rate) = video.frame_rate {
                    if !caps.frame_rates(video.quality).contains(&rate) {
                        return Err(invalid(
                            camera,
                            format!("{} fps at {:?}", rate.value(), video.quality),
                        ));
                    }
                }
                if !caps.dynamic_ranges(video.quality).contains(&video.dynamic_range) {
                    return Err(invalid(
                        camera,
                        format!("{:?} at {:?}", video.dynamic_range, video.quality),
                    ));
                }
                if video.stabilization_enabled && !caps.video_stabilization_supported {
                    return Err(invalid(camera, "video stabilization".to_string()));
                }
            }
            Configuration::Qr(_) => {}
        }
        Ok(())
    }
}

fn invalid(camera: &Device, what: String) -> CameraError {
    CameraError::InvalidConfiguration(format!("{} not supported by {}", what, camera))
}

/// A configuration variant an update can be scoped to
pub trait ConfigurationVariant {
    /// The payload when `configuration` is this variant
    fn extract(configuration: &Configuration) -> Option<&Self>;
}

impl ConfigurationVariant for Configuration {
    fn extract(configuration: &Configuration) -> Option<&Self> {
        Some(configuration)
    }
}

impl ConfigurationVariant for PhotoConfiguration {
    fn extract(configuration: &Configuration) -> Option<&Self> {
        match configuration {
            Configuration::Photo(photo) => Some(photo),
            _ => None,
        }
    }
}

impl ConfigurationVariant for VideoConfiguration {
    fn extract(configuration: &Configuration) -> Option<&Self> {
        match configuration {
            Configuration::Video(video) => Some(video),
            _ => None,
        }
    }
}

impl ConfigurationVariant for QrConfiguration {
    fn extract(configuration: &Configuration) -> Option<&Self> {
        match configuration {
            Configuration::Qr(qr) => Some(qr),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[test]
    fn test_same_mode_clone_without_overrides_is_identity() {
        let camera = fixtures::back_camera();
        let config = Configuration::Video(VideoConfiguration {
            quality: VideoQuality::Uhd,
            frame_rate: Some(FrameRate::Fps30),
            ..VideoConfiguration::new(camera)
        });
        assert_eq!(config.clone_with(ConfigurationOverrides::default()), config);
    }

    #[test]
    fn test_cross_mode_clone_resets_fields() {
        let camera = fixtures::back_camera();
        let photo = Configuration::Photo(PhotoConfiguration {
            effect_mode: ExtensionMode::Night,
            aspect_ratio: AspectRatio::Ratio16x9,
            ..PhotoConfiguration::new(Arc::clone(&camera))
        });

        let video = photo.clone_with(ConfigurationOverrides::capture_mode(CaptureMode::Video));
        assert_eq!(video.capture_mode(), CaptureMode::Video);
        assert_eq!(video.effect_mode(), ExtensionMode::None);

        let back = video.clone_with(ConfigurationOverrides::capture_mode(CaptureMode::Photo));
        assert_eq!(back, Configuration::Photo(PhotoConfiguration::new(camera)));
    }

    #[test]
    fn test_variant_extraction() {
        let qr = Configuration::Qr(QrConfiguration {
            camera: fixtures::front_camera(),
        });
        assert!(QrConfiguration::extract(&qr).is_some());
        assert!(VideoConfiguration::extract(&qr).is_none());
        assert!(Configuration::extract(&qr).is_some());
    }

    #[test]
    fn test_reconcile_then_validate() {
        let front = fixtures::front_camera();
        let config = Configuration::Photo(PhotoConfiguration {
            effect_mode: ExtensionMode::Night,
            capture_technique: CaptureTechnique::ZeroShutterLag,
            high_resolution_enabled: true,
            ..PhotoConfiguration::new(front)
        });
        assert!(config.validate().is_err());

        let reconciled = config.reconcile();
        assert!(reconciled.validate().is_ok());
        assert_eq!(reconciled.effect_mode(), ExtensionMode::None);
    }
}
