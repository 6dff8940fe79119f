//! Camera devices
//!
//! A [`Device`] joins a descriptor from the hardware layer with the
//! capability set derived from its report. Devices are immutable and shared
//! as `Arc<Device>`; attach/detach replaces them instead of mutating.

use crate::capabilities::CapabilitySet;
use crate::config::CameraPolicy;
use crate::platform::{CapabilityReport, DeviceDescriptor};
use crate::types::Facing;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

/// Id of the primary back camera
pub const PRIMARY_BACK_ID: &str = "0";
/// Id of the primary front camera
pub const PRIMARY_FRONT_ID: &str = "1";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Device {
    pub id: String,
    pub facing: Facing,
    /// Backed by more than one physical sensor
    pub is_logical: bool,
    pub intrinsic_zoom_ratio: f32,
    pub physical_ids: BTreeSet<String>,
    pub capabilities: CapabilitySet,
}

impl Device {
    pub fn new(
        descriptor: &DeviceDescriptor,
        report: &CapabilityReport,
        policy: &CameraPolicy,
    ) -> Self {
        let physical_ids: BTreeSet<String> = descriptor.physical_ids.iter().cloned().collect();
        Self {
            id: descriptor.id.clone(),
            facing: descriptor.facing,
            is_logical: physical_ids.len() > 1,
            intrinsic_zoom_ratio: descriptor.intrinsic_zoom_ratio,
            physical_ids,
            capabilities: CapabilitySet::from_report(descriptor, report, policy),
        }
    }

    /// Primary camera for the given facing, if the id is a well-known one
    pub fn primary_id_for(facing: Facing) -> Option<&'static str> {
        match facing {
            Facing::Back => Some(PRIMARY_BACK_ID),
            Facing::Front => Some(PRIMARY_FRONT_ID),
            Facing::External | Facing::Unknown => None,
        }
    }

    pub fn is_primary(&self) -> bool {
        self.id == PRIMARY_BACK_ID || self.id == PRIMARY_FRONT_ID
    }

    pub fn is_external(&self) -> bool {
        self.facing == Facing::External
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "camera {} ({})", self.id, self.facing)
    }
}

/// Order device ids numerically when both parse, lexicographically otherwise.
/// Numeric ids sort before all others.
pub fn compare_ids(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_ordering() {
        let mut ids = vec!["10", "2", "0", "usb-b", "1a", "1", "usb-a"];
        ids.sort_by(|a, b| compare_ids(a, b));
        assert_eq!(ids, vec!["0", "1", "2", "10", "1a", "usb-a", "usb-b"]);
    }

    #[test]
    fn test_logical_flag_from_physical_ids() {
        let descriptor = DeviceDescriptor::new("0", Facing::Back).with_physical_ids(&["2", "3"]);
        let device = Device::new(
            &descriptor,
            &CapabilityReport::default(),
            &CameraPolicy::default(),
        );
        assert!(device.is_logical);
        assert!(device.is_primary());
        assert_eq!(device.to_string(), "camera 0 (back)");
    }
}
