//! Shared value types for camera-session
//!
//! Small, copyable enums describing camera facing, capture modes and the
//! user-tunable capture parameters. Ordering of the variants is meaningful:
//! sorted cycling and flash mode traversal follow declaration order.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Direction a camera faces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Facing {
    Back,
    Front,
    External,
    Unknown,
}

impl Facing {
    /// Traversal order used when flipping between cameras
    pub const FLIP_ORDER: [Facing; 4] = [
        Facing::Back,
        Facing::Front,
        Facing::External,
        Facing::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Facing::Back => "back",
            Facing::Front => "front",
            Facing::External => "external",
            Facing::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Facing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capture mode of the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMode {
    #[default]
    Photo,
    Video,
    Qr,
}

impl CaptureMode {
    /// Flash modes a capture mode can ever use, before device support is considered
    pub fn allowed_flash_modes(&self) -> &'static [FlashMode] {
        match self {
            CaptureMode::Photo => &[
                FlashMode::Off,
                FlashMode::Auto,
                FlashMode::On,
                FlashMode::Torch,
                FlashMode::Screen,
            ],
            CaptureMode::Video | CaptureMode::Qr => &[FlashMode::Off, FlashMode::Torch],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureMode::Photo => "photo",
            CaptureMode::Video => "video",
            CaptureMode::Qr => "qr",
        }
    }
}

impl fmt::Display for CaptureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CaptureMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "photo" => Ok(Self::Photo),
            "video" => Ok(Self::Video),
            "qr" => Ok(Self::Qr),
            other => Err(format!("unknown capture mode: {other}")),
        }
    }
}

/// Flash behaviour requested by the user or applied to the device
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum FlashMode {
    #[default]
    Off,
    Auto,
    On,
    Torch,
    /// Front display lit up as a flash substitute
    Screen,
}

/// Photo aspect ratio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AspectRatio {
    #[default]
    Ratio4x3,
    Ratio16x9,
}

impl AspectRatio {
    /// The two ratios the aspect ratio toggle alternates between
    pub const CYCLE: [AspectRatio; 2] = [AspectRatio::Ratio4x3, AspectRatio::Ratio16x9];
}

/// Photo capture policy trading image quality against shutter latency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CaptureTechnique {
    MaximizeQuality,
    #[default]
    MinimizeLatency,
    ZeroShutterLag,
}

/// Vendor or platform computational photography pipeline
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum ExtensionMode {
    #[default]
    None,
    Bokeh,
    Hdr,
    Night,
    FaceRetouch,
    Auto,
}

impl ExtensionMode {
    /// Map a raw extension id reported by the hardware layer
    pub fn from_raw(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::None),
            1 => Some(Self::Bokeh),
            2 => Some(Self::Hdr),
            3 => Some(Self::Night),
            4 => Some(Self::FaceRetouch),
            5 => Some(Self::Auto),
            _ => None,
        }
    }
}

/// Video recording quality class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoQuality {
    Sd,
    Hd,
    Fhd,
    Uhd,
}

impl VideoQuality {
    /// Nominal frame size (width, height)
    pub fn resolution(&self) -> (u32, u32) {
        match self {
            VideoQuality::Sd => (720, 480),
            VideoQuality::Hd => (1280, 720),
            VideoQuality::Fhd => (1920, 1080),
            VideoQuality::Uhd => (3840, 2160),
        }
    }
}

/// Fixed video frame rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameRate {
    Fps24,
    Fps30,
    Fps60,
    Fps120,
}

impl FrameRate {
    pub const ALL: [FrameRate; 4] = [
        FrameRate::Fps24,
        FrameRate::Fps30,
        FrameRate::Fps60,
        FrameRate::Fps120,
    ];

    pub fn value(&self) -> u32 {
        match self {
            FrameRate::Fps24 => 24,
            FrameRate::Fps30 => 30,
            FrameRate::Fps60 => 60,
            FrameRate::Fps120 => 120,
        }
    }

    pub fn from_value(value: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|rate| rate.value() == value)
    }
}

/// Video encoding dynamic range class
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum DynamicRange {
    #[default]
    Sdr,
    Hlg10Bit,
    Hdr10_10Bit,
    Hdr10Plus10Bit,
    DolbyVision10Bit,
    DolbyVision8Bit,
}

/// Horizontal mirroring applied to recorded video
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VideoMirrorMode {
    Off,
    On,
    #[default]
    OnFrontOnly,
}

impl VideoMirrorMode {
    pub const CYCLE: [VideoMirrorMode; 3] = [
        VideoMirrorMode::Off,
        VideoMirrorMode::On,
        VideoMirrorMode::OnFrontOnly,
    ];
}

/// Viewfinder grid overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GridMode {
    #[default]
    Off,
    On3,
    On4,
    GoldenRatio,
}

/// Self-timer applied before a photo is taken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TimerMode {
    #[default]
    Off,
    Seconds3,
    Seconds10,
}

impl TimerMode {
    pub fn duration(&self) -> Option<Duration> {
        match self {
            TimerMode::Off => None,
            TimerMode::Seconds3 => Some(Duration::from_secs(3)),
            TimerMode::Seconds10 => Some(Duration::from_secs(10)),
        }
    }
}

/// Closed frame-rate range as reported by the sensor or an encoder profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FpsRange {
    pub lower: u32,
    pub upper: u32,
}

impl FpsRange {
    pub const fn new(lower: u32, upper: u32) -> Self {
        Self { lower, upper }
    }

    /// Fixed range with equal bounds
    pub const fn fixed(fps: u32) -> Self {
        Self::new(fps, fps)
    }
}

/// Successor of `current` in `values`, wrapping around.
///
/// Returns the first element when `current` is not in the list and `None`
/// when the list is empty.
pub(crate) fn next_in_cycle<T: PartialEq + Copy>(values: &[T], current: &T) -> Option<T> {
    let first = *values.first()?;
    match values.iter().position(|v| v == current) {
        Some(index) => Some(values[(index + 1) % values.len()]),
        None => Some(first),
    }
}
