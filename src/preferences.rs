//! User preference store
//!
//! Every user-tunable default lives in one [`PreferenceSnapshot`] published
//! through an [`Observable`]. Individual values are read and written through
//! typed [`PreferenceKey`]s, so callers never touch the snapshot layout.
//! Persistence is a plain TOML dump of the snapshot.

use crate::capabilities::sensor::{
    ColorCorrectionAberrationMode, DistortionCorrectionMode, EdgeMode, HotPixelMode,
    NoiseReductionMode, ShadingMode,
};
use crate::errors::CameraError;
use crate::observable::Observable;
use crate::types::{
    AspectRatio, CaptureMode, CaptureTechnique, DynamicRange, ExtensionMode, FlashMode, FrameRate,
    GridMode, TimerMode, VideoMirrorMode, VideoQuality,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tokio::sync::watch;

/// All stored preference values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreferenceSnapshot {
    pub capture_technique: CaptureTechnique,
    /// Upgrade minimize-latency capture to zero-shutter-lag where supported
    pub zero_shutter_lag_enabled: bool,
    pub aspect_ratio: AspectRatio,
    pub extension_mode: ExtensionMode,

    pub video_quality: Option<VideoQuality>,
    pub video_frame_rate: Option<FrameRate>,
    pub video_dynamic_range: DynamicRange,
    pub video_mirror_mode: VideoMirrorMode,
    pub video_stabilization: bool,
    pub video_mic_enabled: bool,

    pub photo_flash_mode: FlashMode,
    pub video_flash_mode: FlashMode,
    pub qr_flash_mode: FlashMode,
    pub force_torch: bool,

    pub grid_mode: GridMode,
    pub timer_mode: TimerMode,
    /// Tag captures with the current location
    pub save_location: bool,

    pub last_camera_id: Option<String>,
    pub last_capture_mode: CaptureMode,

    pub edge_mode: Option<EdgeMode>,
    pub noise_reduction_mode: Option<NoiseReductionMode>,
    pub shading_mode: Option<ShadingMode>,
    pub color_correction_aberration_mode: Option<ColorCorrectionAberrationMode>,
    pub distortion_correction_mode: Option<DistortionCorrectionMode>,
    pub hot_pixel_mode: Option<HotPixelMode>,
}

impl Default for PreferenceSnapshot {
    fn default() -> Self {
        Self {
            capture_technique: CaptureTechnique::default(),
            zero_shutter_lag_enabled: false,
            aspect_ratio: AspectRatio::default(),
            extension_mode: ExtensionMode::default(),
            video_quality: None,
            video_frame_rate: None,
            video_dynamic_range: DynamicRange::default(),
            video_mirror_mode: VideoMirrorMode::default(),
            video_stabilization: true,
            video_mic_enabled: true,
            photo_flash_mode: FlashMode::Off,
            video_flash_mode: FlashMode::Off,
            qr_flash_mode: FlashMode::Off,
            force_torch: false,
            grid_mode: GridMode::default(),
            timer_mode: TimerMode::default(),
            save_location: false,
            last_camera_id: None,
            last_capture_mode: CaptureMode::default(),
            edge_mode: None,
            noise_reduction_mode: None,
            shading_mode: None,
            color_correction_aberration_mode: None,
            distortion_correction_mode: None,
            hot_pixel_mode: None,
        }
    }
}

impl PreferenceSnapshot {
    /// Wanted flash mode for a capture mode
    pub fn flash_mode_for(&self, mode: CaptureMode) -> FlashMode {
        match mode {
            CaptureMode::Photo => self.photo_flash_mode,
            CaptureMode::Video => self.video_flash_mode,
            CaptureMode::Qr => self.qr_flash_mode,
        }
    }

    pub fn set_flash_mode_for(&mut self, mode: CaptureMode, flash_mode: FlashMode) {
        match mode {
            CaptureMode::Photo => self.photo_flash_mode = flash_mode,
            CaptureMode::Video => self.video_flash_mode = flash_mode,
            CaptureMode::Qr => self.qr_flash_mode = flash_mode,
        }
    }
}

/// Typed accessor for one preference value
pub struct PreferenceKey<T> {
    pub name: &'static str,
    get: fn(&PreferenceSnapshot) -> T,
    set: fn(&mut PreferenceSnapshot, T),
}

impl<T> PreferenceKey<T> {
    pub fn read(&self, snapshot: &PreferenceSnapshot) -> T {
        (self.get)(snapshot)
    }

    pub fn write(&self, snapshot: &mut PreferenceSnapshot, value: T) {
        (self.set)(snapshot, value)
    }
}

macro_rules! preference_key {
    ($(#[$meta:meta])* $name:ident: $ty:ty => $field:ident) => {
        $(#[$meta])*
        pub const $name: PreferenceKey<$ty> = PreferenceKey {
            name: stringify!($field),
            get: |snapshot| snapshot.$field.clone(),
            set: |snapshot, value| snapshot.$field = value,
        };
    };
}

/// Every stored preference as a typed key
pub mod keys {
    use super::*;

    preference_key!(CAPTURE_TECHNIQUE: CaptureTechnique => capture_technique);
    preference_key!(ZERO_SHUTTER_LAG_ENABLED: bool => zero_shutter_lag_enabled);
    preference_key!(ASPECT_RATIO: AspectRatio => aspect_ratio);
    preference_key!(EXTENSION_MODE: ExtensionMode => extension_mode);
    preference_key!(VIDEO_QUALITY: Option<VideoQuality> => video_quality);
    preference_key!(VIDEO_FRAME_RATE: Option<FrameRate> => video_frame_rate);
    preference_key!(VIDEO_DYNAMIC_RANGE: DynamicRange => video_dynamic_range);
    preference_key!(VIDEO_MIRROR_MODE: VideoMirrorMode => video_mirror_mode);
    preference_key!(VIDEO_STABILIZATION: bool => video_stabilization);
    preference_key!(VIDEO_MIC_ENABLED: bool => video_mic_enabled);
    preference_key!(PHOTO_FLASH_MODE: FlashMode => photo_flash_mode);
    preference_key!(VIDEO_FLASH_MODE: FlashMode => video_flash_mode);
    preference_key!(QR_FLASH_MODE: FlashMode => qr_flash_mode);
    preference_key!(
        /// Force continuous flash illumination in photo mode
        FORCE_TORCH: bool => force_torch
    );
    preference_key!(GRID_MODE: GridMode => grid_mode);
    preference_key!(TIMER_MODE: TimerMode => timer_mode);
    preference_key!(SAVE_LOCATION: bool => save_location);
    preference_key!(LAST_CAMERA_ID: Option<String> => last_camera_id);
    preference_key!(LAST_CAPTURE_MODE: CaptureMode => last_capture_mode);
    preference_key!(EDGE_MODE: Option<EdgeMode> => edge_mode);
    preference_key!(NOISE_REDUCTION_MODE: Option<NoiseReductionMode> => noise_reduction_mode);
    preference_key!(SHADING_MODE: Option<ShadingMode> => shading_mode);
    preference_key!(
        COLOR_CORRECTION_ABERRATION_MODE: Option<ColorCorrectionAberrationMode>
            => color_correction_aberration_mode
    );
    preference_key!(
        DISTORTION_CORRECTION_MODE: Option<DistortionCorrectionMode> => distortion_correction_mode
    );
    preference_key!(HOT_PIXEL_MODE: Option<HotPixelMode> => hot_pixel_mode);

    /// Flash preference key of a capture mode
    pub fn flash_mode_for(mode: CaptureMode) -> PreferenceKey<FlashMode> {
        match mode {
            CaptureMode::Photo => PHOTO_FLASH_MODE,
            CaptureMode::Video => VIDEO_FLASH_MODE,
            CaptureMode::Qr => QR_FLASH_MODE,
        }
    }
}

/// Shared handle to the preference store
#[derive(Debug, Clone, Default)]
pub struct Preferences {
    values: Observable<PreferenceSnapshot>,
}

impl Preferences {
    pub fn new(initial: PreferenceSnapshot) -> Self {
        Self {
            values: Observable::new(initial),
        }
    }

    pub fn get<T>(&self, key: &PreferenceKey<T>) -> T {
        self.values.with(|snapshot| key.read(snapshot))
    }

    /// Store a value; subscribers are only notified when it changed
    pub fn set<T: PartialEq>(&self, key: &PreferenceKey<T>, value: T) -> bool {
        let mut next = self.values.get();
        if key.read(&next) == value {
            return false;
        }
        key.write(&mut next, value);
        log::debug!("Preference {} updated", key.name);
        self.values.set(next);
        true
    }

    /// Apply several changes as one update
    pub fn update(&self, f: impl FnOnce(&mut PreferenceSnapshot)) -> bool {
        let mut next = self.values.get();
        f(&mut next);
        self.values.set_if_changed(next)
    }

    pub fn snapshot(&self) -> PreferenceSnapshot {
        self.values.get()
    }

    /// Receiver woken on every change
    pub fn subscribe(&self) -> watch::Receiver<PreferenceSnapshot> {
        self.values.subscribe()
    }

    /// Load a stored snapshot; a missing file yields the defaults
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, CameraError> {
        let path = path.as_ref();
        if !path.exists() {
            log::info!("Preferences file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(|e| {
            CameraError::ConfigError(format!("Failed to read preferences file: {}", e))
        })?;
        let snapshot: PreferenceSnapshot = toml::from_str(&contents)?;
        Ok(Self::new(snapshot))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), CameraError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                CameraError::ConfigError(format!("Failed to create preferences directory: {}", e))
            })?;
        }

        let toml_string = toml::to_string_pretty(&self.snapshot())?;
        fs::write(path, toml_string).map_err(|e| {
            CameraError::ConfigError(format!("Failed to write preferences file: {}", e))
        })?;

        log::debug!("Saved preferences to {:?}", path);
        Ok(())
    }
}
