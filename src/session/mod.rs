//! Camera session
//!
//! The [`SessionCoordinator`] owns the bound [`Configuration`], the capture
//! state machine and the derived live views, and is the only component that
//! talks to the [`CaptureBackend`](crate::platform::CaptureBackend).
//!
//! Requests that cannot be served right now (a rebind in flight, a capture in
//! progress, a request for another capture mode) are not errors. They are
//! reported as [`UpdateOutcome`] or [`CaptureOutcome`] values and logged at
//! debug level.
//!
//! [`Configuration`]: crate::configuration::Configuration

pub mod capture_state;
pub mod coordinator;
pub mod views;
pub mod zoom;

pub use capture_state::{CaptureState, CaptureStateMachine};
pub use coordinator::SessionCoordinator;
pub use views::LiveViews;
pub use zoom::ZoomController;

use crate::errors::CameraError;
use crate::platform::{PhotoOutput, VideoOutput};
use crate::types::CaptureMode;
use serde::Serialize;
use std::time::Duration;

/// Result of a configuration update request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateOutcome {
    /// The new configuration was validated, bound and published
    Applied,
    /// The transform produced the current configuration
    Unchanged,
    /// Another reconfiguration holds the rebind lock
    Busy,
    CaptureInProgress,
    /// The bound configuration is not of the requested variant
    ModeMismatch,
    NothingToCycle,
}

impl UpdateOutcome {
    pub fn is_applied(&self) -> bool {
        *self == UpdateOutcome::Applied
    }
}

/// Result of a capture trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureOutcome {
    /// The capture (or countdown) was started
    Started,
    /// An active recording was asked to stop
    StopRequested,
    /// The same capture is already running; nothing was sent to the hardware
    AlreadyInProgress,
    /// A reconfiguration holds the rebind lock
    Busy,
    NotAllowed(CaptureState),
    /// Video capture outside video mode
    WrongMode(CaptureMode),
}

/// Notifications published by the session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    ConfigurationApplied {
        camera_id: String,
        capture_mode: CaptureMode,
    },
    /// A configuration failed validation or binding and was not published
    ConfigurationRejected(CameraError),
    /// The bound camera disappeared from the device list
    CameraLost { camera_id: String },
    CountdownStarted(Duration),
    CountdownCancelled,
    PhotoCaptured(PhotoOutput),
    PhotoFailed(CameraError),
    RecordingStarted,
    RecordingStatus {
        duration: Duration,
        bytes_written: u64,
    },
    RecordingPaused,
    RecordingResumed,
    RecordingFinalized(Result<VideoOutput, CameraError>),
}
