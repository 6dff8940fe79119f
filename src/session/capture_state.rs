//! Capture pipeline state machine
//!
//! ```text
//! Idle -> Countdown -> TakingPhoto -> Idle
//! Idle -> TakingPhoto -> Idle
//! Idle -> PreRecordingVideo -> RecordingVideo <-> RecordingVideoPaused -> Idle
//! ```
//!
//! Transitions are compare-and-set under one mutex and published through an
//! observable so readers never lock. Idle is the only state in which the
//! session may be reconfigured.

use crate::invariant;
use crate::observable::Observable;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CaptureState {
    #[default]
    Idle,
    Countdown,
    TakingPhoto,
    PreRecordingVideo,
    RecordingVideo,
    RecordingVideoPaused,
}

impl CaptureState {
    pub fn is_recording(&self) -> bool {
        matches!(
            self,
            CaptureState::PreRecordingVideo
                | CaptureState::RecordingVideo
                | CaptureState::RecordingVideoPaused
        )
    }
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CaptureState::Idle => "idle",
            CaptureState::Countdown => "countdown",
            CaptureState::TakingPhoto => "taking photo",
            CaptureState::PreRecordingVideo => "pre-recording video",
            CaptureState::RecordingVideo => "recording video",
            CaptureState::RecordingVideoPaused => "recording video (paused)",
        };
        f.write_str(name)
    }
}

/// Result of a photo request against the current state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotoTransition {
    /// Moved to `TakingPhoto`; the hardware command must be issued
    Started,
    /// A photo is already being taken
    AlreadyTaking,
    NotAllowed(CaptureState),
}

/// Result of a video request against the current state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoTransition {
    /// Moved to `PreRecordingVideo`; recording must be started
    Start,
    /// A recording is active; the request means stop
    Stop,
    NotAllowed(CaptureState),
}

#[derive(Debug, Default)]
pub struct CaptureStateMachine {
    state: Mutex<CaptureState>,
    published: Observable<CaptureState>,
}

impl CaptureStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> CaptureState {
        self.published.get()
    }

    pub fn is_idle(&self) -> bool {
        self.get() == CaptureState::Idle
    }

    pub fn subscribe(&self) -> watch::Receiver<CaptureState> {
        self.published.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, CaptureState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &mut MutexGuard<'_, CaptureState>, next: CaptureState) {
        log::debug!("Capture state {} -> {}", **state, next);
        **state = next;
        self.published.set(next);
    }

    pub fn begin_countdown(&self) -> bool {
        let mut state = self.lock();
        if *state != CaptureState::Idle {
            return false;
        }
        self.publish(&mut state, CaptureState::Countdown);
        true
    }

    pub fn cancel_countdown(&self) -> bool {
        let mut state = self.lock();
        if *state != CaptureState::Countdown {
            return false;
        }
        self.publish(&mut state, CaptureState::Idle);
        true
    }

    pub fn begin_photo(&self) -> PhotoTransition {
        let mut state = self.lock();
        match *state {
            CaptureState::Idle | CaptureState::Countdown => {
                self.publish(&mut state, CaptureState::TakingPhoto);
                PhotoTransition::Started
            }
            CaptureState::TakingPhoto => PhotoTransition::AlreadyTaking,
            other => PhotoTransition::NotAllowed(other),
        }
    }

    /// Photo completed, successfully or not
    pub fn finish_photo(&self) {
        let mut state = self.lock();
        if *state != CaptureState::TakingPhoto {
            drop(state);
            invariant::violation("Photo completion requires TakingPhoto", "capture state");
        }
        self.publish(&mut state, CaptureState::Idle);
    }

    pub fn request_video(&self) -> VideoTransition {
        let mut state = self.lock();
        match *state {
            CaptureState::Idle => {
                self.publish(&mut state, CaptureState::PreRecordingVideo);
                VideoTransition::Start
            }
            CaptureState::RecordingVideo | CaptureState::RecordingVideoPaused => {
                VideoTransition::Stop
            }
            other => VideoTransition::NotAllowed(other),
        }
    }

    /// Hardware confirmed the recording; ignored when it already finalized
    pub fn recording_started(&self) -> bool {
        let mut state = self.lock();
        if *state != CaptureState::PreRecordingVideo {
            log::debug!("Ignoring recording start confirmation in state {}", *state);
            return false;
        }
        self.publish(&mut state, CaptureState::RecordingVideo);
        true
    }

    pub fn pause_recording(&self) {
        let mut state = self.lock();
        if *state != CaptureState::RecordingVideo {
            drop(state);
            invariant::violation("Pause requires RecordingVideo", "capture state");
        }
        self.publish(&mut state, CaptureState::RecordingVideoPaused);
    }

    pub fn resume_recording(&self) {
        let mut state = self.lock();
        if *state != CaptureState::RecordingVideoPaused {
            drop(state);
            invariant::violation("Resume requires RecordingVideoPaused", "capture state");
        }
        self.publish(&mut state, CaptureState::RecordingVideo);
    }

    /// Recording finalized with any outcome, or failed to start
    pub fn recording_finalized(&self) {
        let mut state = self.lock();
        if !state.is_recording() {
            log::debug!("Ignoring recording finalize in state {}", *state);
            return;
        }
        self.publish(&mut state, CaptureState::Idle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_photo_cycle() {
        let machine = CaptureStateMachine::new();
        assert_eq!(machine.begin_photo(), PhotoTransition::Started);
        assert_eq!(machine.begin_photo(), PhotoTransition::AlreadyTaking);
        machine.finish_photo();
        assert!(machine.is_idle());
    }

    #[test]
    fn test_countdown_then_photo() {
        let machine = CaptureStateMachine::new();
        assert!(machine.begin_countdown());
        assert!(!machine.begin_countdown());
        assert_eq!(machine.begin_photo(), PhotoTransition::Started);
        assert!(!machine.cancel_countdown());
    }

    #[test]
    fn test_video_cycle() {
        let machine = CaptureStateMachine::new();
        assert_eq!(machine.request_video(), VideoTransition::Start);
        assert_eq!(
            machine.request_video(),
            VideoTransition::NotAllowed(CaptureState::PreRecordingVideo)
        );
        assert!(machine.recording_started());
        machine.pause_recording();
        assert_eq!(machine.get(), CaptureState::RecordingVideoPaused);
        assert_eq!(machine.request_video(), VideoTransition::Stop);
        assert_eq!(machine.get(), CaptureState::RecordingVideoPaused);
        machine.resume_recording();
        machine.recording_finalized();
        assert!(machine.is_idle());
    }

    #[test]
    fn test_photo_rejected_while_recording() {
        let machine = CaptureStateMachine::new();
        machine.request_video();
        assert_eq!(
            machine.begin_photo(),
            PhotoTransition::NotAllowed(CaptureState::PreRecordingVideo)
        );
    }

    #[test]
    #[should_panic(expected = "Pause requires RecordingVideo")]
    fn test_pause_outside_recording_is_fatal() {
        CaptureStateMachine::new().pause_recording();
    }

    #[test]
    #[should_panic(expected = "Resume requires RecordingVideoPaused")]
    fn test_resume_outside_pause_is_fatal() {
        let machine = CaptureStateMachine::new();
        machine.request_video();
        machine.recording_started();
        machine.resume_recording();
    }
}
