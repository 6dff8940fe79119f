//! Sensor tuning modes
//!
//! Each mode maps a raw hardware integer to a named value. Unknown raw
//! values are dropped so newer drivers never break capability parsing.
//! The `ALLOWED_ON_ZSL` and `ALLOWED_ON_VIDEO` tables are hardware policy:
//! the values that stay legal while zero-shutter-lag capture or video mode
//! is active.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::Debug;

/// Common behaviour of every sensor tuning enum
pub trait SensorMode: Copy + Ord + Debug + 'static {
    /// Name used in logs
    const NAME: &'static str;
    const ALLOWED_ON_ZSL: &'static [Self];
    const ALLOWED_ON_VIDEO: &'static [Self];

    fn from_raw(value: i32) -> Option<Self>;
    fn raw(&self) -> i32;

    fn is_allowed_on_zsl(&self) -> bool {
        Self::ALLOWED_ON_ZSL.contains(self)
    }

    fn is_allowed_on_video(&self) -> bool {
        Self::ALLOWED_ON_VIDEO.contains(self)
    }
}

macro_rules! sensor_mode {
    (
        $(#[$meta:meta])*
        $name:ident, $label:literal {
            $($variant:ident = $raw:literal),+ $(,)?
        }
        zsl: [$($zsl:ident),*],
        video: [$($video:ident),*]
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl SensorMode for $name {
            const NAME: &'static str = $label;
            const ALLOWED_ON_ZSL: &'static [Self] = &[$($name::$zsl),*];
            const ALLOWED_ON_VIDEO: &'static [Self] = &[$($name::$video),*];

            fn from_raw(value: i32) -> Option<Self> {
                match value {
                    $($raw => Some($name::$variant),)+
                    _ => None,
                }
            }

            fn raw(&self) -> i32 {
                match self {
                    $($name::$variant => $raw),+
                }
            }
        }
    };
}

sensor_mode! {
    /// Edge enhancement applied by the ISP
    EdgeMode, "edge" {
        Off = 0,
        Fast = 1,
        HighQuality = 2,
        ZeroShutterLag = 3,
    }
    zsl: [Off, Fast, ZeroShutterLag],
    video: [Off, Fast]
}

sensor_mode! {
    NoiseReductionMode, "noise_reduction" {
        Off = 0,
        Fast = 1,
        HighQuality = 2,
        Minimal = 3,
        ZeroShutterLag = 4,
    }
    zsl: [Off, Fast, Minimal, ZeroShutterLag],
    video: [Off, Fast, Minimal]
}

sensor_mode! {
    /// Lens shading correction
    ShadingMode, "shading" {
        Off = 0,
        Fast = 1,
        HighQuality = 2,
    }
    zsl: [Off, Fast],
    video: [Off, Fast]
}

sensor_mode! {
    /// Chromatic aberration correction
    ColorCorrectionAberrationMode, "color_correction_aberration" {
        Off = 0,
        Fast = 1,
        HighQuality = 2,
    }
    zsl: [Off, Fast],
    video: [Off, Fast]
}

sensor_mode! {
    DistortionCorrectionMode, "distortion_correction" {
        Off = 0,
        Fast = 1,
        HighQuality = 2,
    }
    zsl: [Off, Fast],
    video: [Off, Fast]
}

sensor_mode! {
    HotPixelMode, "hot_pixel" {
        Off = 0,
        Fast = 1,
        HighQuality = 2,
    }
    zsl: [Off, Fast],
    video: [Off, Fast]
}

/// Map raw hardware values through the lookup table, dropping unknown ones
pub fn parse_modes<M: SensorMode>(raw: &[i32]) -> BTreeSet<M> {
    raw.iter()
        .filter_map(|&value| {
            let mode = M::from_raw(value);
            if mode.is_none() {
                log::debug!("Ignoring unknown {} mode value {}", M::NAME, value);
            }
            mode
        })
        .collect()
}

/// Which capture technique constrains sensor tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TuningContext {
    Photo,
    ZeroShutterLag,
    Video,
}

/// Pick `wanted` if the device supports it and the context allows it.
///
/// `None` leaves the choice to the driver.
pub fn resolve_mode<M: SensorMode>(
    wanted: Option<M>,
    supported: &BTreeSet<M>,
    context: TuningContext,
) -> Option<M> {
    let mode = wanted?;
    if !supported.contains(&mode) {
        log::debug!("{} mode {:?} not supported by device", M::NAME, mode);
        return None;
    }
    let allowed = match context {
        TuningContext::Photo => true,
        TuningContext::ZeroShutterLag => mode.is_allowed_on_zsl(),
        TuningContext::Video => mode.is_allowed_on_video(),
    };
    if allowed {
        Some(mode)
    } else {
        log::debug!("{} mode {:?} not allowed in {:?}", M::NAME, mode, context);
        None
    }
}

/// Resolved sensor tuning handed to the hardware on bind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SensorTuning {
    pub edge: Option<EdgeMode>,
    pub noise_reduction: Option<NoiseReductionMode>,
    pub shading: Option<ShadingMode>,
    pub color_correction_aberration: Option<ColorCorrectionAberrationMode>,
    pub distortion_correction: Option<DistortionCorrectionMode>,
    pub hot_pixel: Option<HotPixelMode>,
}
