//! Configuration management for camera-session
//!
//! Provides loading, saving and validation of the session configuration: the
//! per-device policy overlay, the default user preferences and zoom tuning.
//! Files are TOML; `load_layered` additionally merges `CAMERA_SESSION__*`
//! environment variables on top of the file.

use crate::errors::CameraError;
use crate::platform::DeviceDescriptor;
use crate::preferences::PreferenceSnapshot;
use crate::types::{FrameRate, VideoQuality};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Prefix of environment variables read by [`SessionConfig::load_layered`]
pub const ENV_PREFIX: &str = "CAMERA_SESSION";

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SessionConfig {
    pub policy: CameraPolicy,
    /// Preference values used until the user changes them
    pub preferences: PreferenceSnapshot,
    pub zoom: ZoomConfig,
}

/// Static per-device corrections and filters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraPolicy {
    /// Expose internal cameras other than the primary back and front ones
    pub enable_auxiliary_cameras: bool,
    /// Auxiliary camera ids never exposed
    pub ignored_auxiliary_camera_ids: Vec<String>,
    /// Hide auxiliary cameras backed by more than one physical sensor
    pub ignore_logical_auxiliary_cameras: bool,
    /// Cameras allowed to capture at high resolution
    pub high_resolution_camera_ids: Vec<String>,
    pub frame_rate_overrides: Vec<FrameRateOverride>,
    pub logical_zoom_ratios: Vec<LogicalZoomRatio>,
}

/// Whether an override adds or removes a frame rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideAction {
    Add,
    Remove,
}

/// Correction of a hardware-reported frame rate for one quality of one camera
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRateOverride {
    pub camera_id: String,
    pub quality: VideoQuality,
    /// Frames per second; must be one of the known frame rates
    pub frame_rate: u32,
    pub action: OverrideAction,
}

/// Discrete zoom step exposed for a camera and the ratio it actually applies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogicalZoomRatio {
    pub camera_id: String,
    pub ratio: f32,
    pub effective_ratio: f32,
}

/// Smooth zoom animation tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoomConfig {
    /// Number of intermediate ratios applied during a smooth zoom
    pub smooth_zoom_steps: u32,
    /// Delay between two steps in milliseconds
    pub smooth_zoom_step_ms: u64,
}

impl Default for CameraPolicy {
    fn default() -> Self {
        Self {
            enable_auxiliary_cameras: true,
            ignored_auxiliary_camera_ids: Vec::new(),
            ignore_logical_auxiliary_cameras: false,
            high_resolution_camera_ids: Vec::new(),
            frame_rate_overrides: Vec::new(),
            logical_zoom_ratios: Vec::new(),
        }
    }
}

impl Default for ZoomConfig {
    fn default() -> Self {
        Self {
            smooth_zoom_steps: 10,
            smooth_zoom_step_ms: 16,
        }
    }
}

impl CameraPolicy {
    /// Whether an internal auxiliary camera passes the overlay filters
    pub fn allows_auxiliary_camera(&self, device: &DeviceDescriptor) -> bool {
        if !self.enable_auxiliary_cameras {
            return false;
        }
        if self.ignored_auxiliary_camera_ids.contains(&device.id) {
            return false;
        }
        !(self.ignore_logical_auxiliary_cameras && device.physical_ids.len() > 1)
    }

    pub fn frame_rate_overrides_for<'a>(
        &'a self,
        camera_id: &'a str,
    ) -> impl Iterator<Item = &'a FrameRateOverride> + 'a {
        self.frame_rate_overrides
            .iter()
            .filter(move |entry| entry.camera_id == camera_id)
    }

    /// Logical zoom table of a camera, sorted by discrete ratio
    pub fn logical_zoom_ratios_for(&self, camera_id: &str) -> Vec<(f32, f32)> {
        let mut ratios: Vec<(f32, f32)> = self
            .logical_zoom_ratios
            .iter()
            .filter(|entry| entry.camera_id == camera_id)
            .map(|entry| (entry.ratio, entry.effective_ratio))
            .collect();
        ratios.sort_by(|a, b| a.0.total_cmp(&b.0));
        ratios.dedup_by(|a, b| a.0 == b.0);
        ratios
    }

    pub fn high_resolution_enabled_for(&self, camera_id: &str) -> bool {
        self.high_resolution_camera_ids
            .iter()
            .any(|id| id == camera_id)
    }
}

impl SessionConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, CameraError> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(|e| {
            CameraError::ConfigError(format!("Failed to read config file: {}", e))
        })?;

        let config: SessionConfig = toml::from_str(&contents)?;

        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Load a TOML file (optional) and overlay `CAMERA_SESSION__*` variables.
    ///
    /// Nested keys use a double underscore, e.g.
    /// `CAMERA_SESSION__ZOOM__SMOOTH_ZOOM_STEPS=4`.
    pub fn load_layered<P: AsRef<Path>>(path: P) -> Result<Self, CameraError> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            .add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: SessionConfig = settings.try_deserialize()?;
        log::debug!("Loaded layered configuration from {:?} and environment", path);
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), CameraError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                CameraError::ConfigError(format!("Failed to create config directory: {}", e))
            })?;
        }

        let toml_string = toml::to_string_pretty(self)?;

        fs::write(path, toml_string).map_err(|e| {
            CameraError::ConfigError(format!("Failed to write config file: {}", e))
        })?;

        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Get default config file path
    pub fn default_path() -> PathBuf {
        PathBuf::from("camera-session.toml")
    }

    /// Load from default location or fall back to defaults
    pub fn load_or_default() -> Self {
        Self::load_from_file(Self::default_path()).unwrap_or_else(|e| {
            log::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.zoom.smooth_zoom_steps == 0 || self.zoom.smooth_zoom_steps > 120 {
            return Err("Smooth zoom steps must be between 1 and 120".to_string());
        }
        if self.zoom.smooth_zoom_step_ms > 1000 {
            return Err("Smooth zoom step delay must not exceed 1000 ms".to_string());
        }

        for entry in &self.policy.frame_rate_overrides {
            if FrameRate::from_value(entry.frame_rate).is_none() {
                return Err(format!(
                    "Frame rate override for camera {} uses unknown rate {}",
                    entry.camera_id, entry.frame_rate
                ));
            }
        }

        for entry in &self.policy.logical_zoom_ratios {
            if !(entry.ratio > 0.0 && entry.effective_ratio > 0.0) {
                return Err(format!(
                    "Logical zoom ratios for camera {} must be positive",
                    entry.camera_id
                ));
            }
        }

        if self.preferences.last_camera_id.as_deref() == Some("") {
            return Err("Last camera id must not be empty".to_string());
        }

        Ok(())
    }
}
