//! camera-session: camera configuration and capture session engine
//!
//! This crate reconciles what a camera application wants (stored
//! preferences, user gestures) with what the hardware offers (the devices
//! present and their capabilities), and drives a capture pipeline through a
//! small state machine.
//!
//! # Features
//! - Device catalog with hot-plugged external cameras
//! - Capability model derived from raw driver reports and a policy overlay
//! - Immutable, mode-tagged capture configurations
//! - Serialized reconfiguration with non-blocking rejection
//! - Photo, self-timer and video capture with pause/resume
//! - Observable live views for a viewfinder UI
//!
//! # Usage
//! ```rust,no_run
//! use camera_session::testing::{SyntheticCapabilitySource, SyntheticCaptureBackend};
//! use camera_session::{SessionConfig, SessionCoordinator};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), camera_session::CameraError> {
//! let session = SessionCoordinator::from_config(
//!     Arc::new(SyntheticCapabilitySource::reference()),
//!     Arc::new(SyntheticCaptureBackend::auto_complete()),
//!     &SessionConfig::load_or_default(),
//! )?;
//! session.flip_camera()?;
//! session.take_photo();
//! # Ok(())
//! # }
//! ```
pub mod capabilities;
pub mod catalog;
pub mod config;
pub mod configuration;
pub mod device;
pub mod environment;
pub mod errors;
pub mod invariant;
pub mod observable;
pub mod platform;
pub mod preferences;
pub mod session;
pub mod types;

// Testing utilities - synthetic hardware for offline testing
pub mod testing;

// Re-exports for convenience
pub use capabilities::CapabilitySet;
pub use catalog::DeviceCatalog;
pub use config::{CameraPolicy, SessionConfig};
pub use configuration::{Configuration, PhotoConfiguration, QrConfiguration, VideoConfiguration};
pub use device::Device;
pub use environment::Environment;
pub use errors::CameraError;
pub use preferences::{PreferenceSnapshot, Preferences};
pub use session::{
    CaptureOutcome, CaptureState, LiveViews, SessionCoordinator, SessionEvent, UpdateOutcome,
};
pub use types::{CaptureMode, Facing, FlashMode};

/// Initialize logging for the camera session
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "camera_session=info");
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Get crate information
pub fn get_info() -> CrateInfo {
    CrateInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: DESCRIPTION.to_string(),
    }
}

/// Crate information structure
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CrateInfo {
    pub name: String,
    pub version: String,
    pub description: String,
}
