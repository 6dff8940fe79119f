//! Video capability composition
//!
//! Hardware reports are frequently incomplete, so supported frame rates are
//! built in two steps: the sensor/profile intersection, then the per-device
//! override list from the policy overlay. Dynamic ranges are composed
//! independently and a quality survives only if both steps know about it.

use crate::config::{FrameRateOverride, OverrideAction};
use crate::platform::VideoProfile;
use crate::types::{DynamicRange, FpsRange, FrameRate, VideoQuality};
use serde::Serialize;
use std::collections::BTreeSet;

/// Frame rates and dynamic ranges a device supports for one quality
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoQualityInfo {
    pub quality: VideoQuality,
    pub frame_rates: BTreeSet<FrameRate>,
    pub dynamic_ranges: BTreeSet<DynamicRange>,
}

/// Base frame rates per quality: profile ranges also offered by the sensor,
/// mapped through their upper bound.
pub fn base_frame_rates(
    sensor_fps_ranges: &[FpsRange],
    profiles: &[VideoProfile],
) -> Vec<(VideoQuality, BTreeSet<FrameRate>)> {
    let mut result: Vec<(VideoQuality, BTreeSet<FrameRate>)> = Vec::new();

    for profile in profiles {
        let rates: BTreeSet<FrameRate> = profile
            .fps_ranges
            .iter()
            .filter(|range| sensor_fps_ranges.contains(range))
            .filter_map(|range| FrameRate::from_value(range.upper))
            .collect();

        match result.iter_mut().find(|(quality, _)| *quality == profile.quality) {
            Some((_, existing)) => existing.extend(rates),
            None => result.push((profile.quality, rates)),
        }
    }

    result
}

/// Apply the overlay's add/remove corrections in list order
pub fn apply_frame_rate_overrides<'a>(
    mut base: Vec<(VideoQuality, BTreeSet<FrameRate>)>,
    overrides: impl IntoIterator<Item = &'a FrameRateOverride>,
) -> Vec<(VideoQuality, BTreeSet<FrameRate>)> {
    for entry in overrides {
        let Some(rate) = FrameRate::from_value(entry.frame_rate) else {
            log::warn!(
                "Ignoring frame rate override with unsupported rate {} for camera {}",
                entry.frame_rate,
                entry.camera_id
            );
            continue;
        };

        match entry.action {
            OverrideAction::Add => {
                match base.iter_mut().find(|(quality, _)| *quality == entry.quality) {
                    Some((_, rates)) => {
                        rates.insert(rate);
                    }
                    None => base.push((entry.quality, BTreeSet::from([rate]))),
                }
            }
            OverrideAction::Remove => {
                if let Some((_, rates)) =
                    base.iter_mut().find(|(quality, _)| *quality == entry.quality)
                {
                    rates.remove(&rate);
                }
            }
        }
    }

    base
}

/// Dynamic ranges per quality: the profile's ranges the encoder can produce.
/// Qualities with an empty intersection are left out.
pub fn dynamic_ranges(
    encoder_dynamic_ranges: &[DynamicRange],
    profiles: &[VideoProfile],
) -> Vec<(VideoQuality, BTreeSet<DynamicRange>)> {
    let mut result: Vec<(VideoQuality, BTreeSet<DynamicRange>)> = Vec::new();

    for profile in profiles {
        let ranges: BTreeSet<DynamicRange> = profile
            .dynamic_ranges
            .iter()
            .copied()
            .filter(|range| encoder_dynamic_ranges.contains(range))
            .collect();
        if ranges.is_empty() {
            continue;
        }

        match result.iter_mut().find(|(quality, _)| *quality == profile.quality) {
            Some((_, existing)) => existing.extend(ranges),
            None => result.push((profile.quality, ranges)),
        }
    }

    result
}

/// Join both compositions, keeping frame-rate order and only qualities present in both
pub fn compose(
    frame_rates: Vec<(VideoQuality, BTreeSet<FrameRate>)>,
    dynamic_ranges: Vec<(VideoQuality, BTreeSet<DynamicRange>)>,
) -> Vec<VideoQualityInfo> {
    frame_rates
        .into_iter()
        .filter_map(|(quality, frame_rates)| {
            let ranges = dynamic_ranges
                .iter()
                .find(|(candidate, _)| *candidate == quality)
                .map(|(_, ranges)| ranges.clone());
            match ranges {
                Some(dynamic_ranges) => Some(VideoQualityInfo {
                    quality,
                    frame_rates,
                    dynamic_ranges,
                }),
                None => {
                    log::debug!("Dropping video quality {:?}: no usable dynamic range", quality);
                    None
                }
            }
        })
        .collect()
}
