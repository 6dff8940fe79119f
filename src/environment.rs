//! Live environment streams
//!
//! Thermal status, device orientation, location and battery are produced by
//! system services outside this crate. The session only reads them; producers
//! push new values through the setters.

use crate::observable::Observable;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Device thermal pressure, mirroring the platform power manager levels
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum ThermalStatus {
    #[default]
    None,
    Light,
    Moderate,
    Severe,
    Critical,
    Emergency,
    Shutdown,
}

/// Physical rotation of the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
    ReversePortrait,
    ReverseLandscape,
}

impl Orientation {
    pub fn rotation_degrees(&self) -> u16 {
        match self {
            Orientation::Portrait => 0,
            Orientation::Landscape => 90,
            Orientation::ReversePortrait => 180,
            Orientation::ReverseLandscape => 270,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: Option<f64>,
    pub accuracy_m: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatteryState {
    /// Charge in percent, 0-100
    pub level: u8,
    pub charging: bool,
}

impl Default for BatteryState {
    fn default() -> Self {
        Self {
            level: 100,
            charging: false,
        }
    }
}

/// Point-in-time copy of every environment stream
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EnvironmentSnapshot {
    pub thermal: ThermalStatus,
    pub orientation: Orientation,
    pub location: Option<Location>,
    pub battery: BatteryState,
}

/// Receivers for every environment stream, used by the session reactor
pub struct EnvironmentReceivers {
    pub thermal: watch::Receiver<ThermalStatus>,
    pub orientation: watch::Receiver<Orientation>,
    pub location: watch::Receiver<Option<Location>>,
    pub battery: watch::Receiver<BatteryState>,
}

#[derive(Debug, Clone, Default)]
pub struct Environment {
    thermal: Observable<ThermalStatus>,
    orientation: Observable<Orientation>,
    location: Observable<Option<Location>>,
    battery: Observable<BatteryState>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_thermal_status(&self, status: ThermalStatus) {
        if self.thermal.set_if_changed(status) {
            log::info!("Thermal status changed to {:?}", status);
        }
    }

    pub fn set_orientation(&self, orientation: Orientation) {
        self.orientation.set_if_changed(orientation);
    }

    pub fn set_location(&self, location: Option<Location>) {
        self.location.set_if_changed(location);
    }

    pub fn set_battery(&self, battery: BatteryState) {
        self.battery.set_if_changed(battery);
    }

    pub fn snapshot(&self) -> EnvironmentSnapshot {
        EnvironmentSnapshot {
            thermal: self.thermal.get(),
            orientation: self.orientation.get(),
            location: self.location.get(),
            battery: self.battery.get(),
        }
    }

    pub fn subscribe(&self) -> EnvironmentReceivers {
        EnvironmentReceivers {
            thermal: self.thermal.subscribe(),
            orientation: self.orientation.subscribe(),
            location: self.location.subscribe(),
            battery: self.battery.subscribe(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_updates() {
        let env = Environment::new();
        env.set_thermal_status(ThermalStatus::Severe);
        env.set_orientation(Orientation::Landscape);
        env.set_battery(BatteryState {
            level: 12,
            charging: false,
        });

        let snapshot = env.snapshot();
        assert_eq!(snapshot.thermal, ThermalStatus::Severe);
        assert_eq!(snapshot.orientation.rotation_degrees(), 90);
        assert_eq!(snapshot.battery.level, 12);
        assert!(snapshot.location.is_none());
    }

    #[test]
    fn test_thermal_ordering() {
        assert!(ThermalStatus::Critical > ThermalStatus::Severe);
        assert!(ThermalStatus::Light < ThermalStatus::Moderate);
    }
}
