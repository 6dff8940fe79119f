//! Synthetic hardware for offline testing
//!
//! [`SyntheticCapabilitySource`] serves canned device reports and lets tests
//! attach and detach cameras. [`SyntheticCaptureBackend`] records every
//! command it receives. In manual mode completions are held until a test
//! releases them; in auto mode photos complete and recordings start and stop
//! immediately, from inside the triggering call.

use super::fixtures;
use crate::errors::CameraError;
use crate::platform::{
    BindRequest, CapabilityReport, CapabilitySource, CaptureBackend, DeviceDescriptor,
    DeviceEvent, OutputTarget, PhotoCallback, PhotoOutput, PhotoRequest, RecordingEvent,
    RecordingHandle, RecordingListener, VideoOutput, VideoRequest,
};
use crate::types::FlashMode;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Capability source backed by an in-memory device list
pub struct SyntheticCapabilitySource {
    devices: Mutex<Vec<(DeviceDescriptor, CapabilityReport)>>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<DeviceEvent>>>,
}

impl SyntheticCapabilitySource {
    pub fn new(devices: Vec<(DeviceDescriptor, CapabilityReport)>) -> Self {
        Self {
            devices: Mutex::new(devices),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Source with the reference back, front and ultra-wide cameras
    pub fn reference() -> Self {
        Self::new(fixtures::reference_devices())
    }

    pub fn external_camera(id: &str) -> (DeviceDescriptor, CapabilityReport) {
        fixtures::external_camera(id)
    }

    /// Plug a device in and notify subscribers
    pub fn attach(&self, device: (DeviceDescriptor, CapabilityReport)) {
        let id = device.0.id.clone();
        {
            let mut devices = lock(&self.devices);
            devices.retain(|(descriptor, _)| descriptor.id != id);
            devices.push(device);
        }
        self.notify(DeviceEvent::Connected(id));
    }

    /// Unplug a device; returns whether it was present
    pub fn detach(&self, id: &str) -> bool {
        let removed = {
            let mut devices = lock(&self.devices);
            let before = devices.len();
            devices.retain(|(descriptor, _)| descriptor.id != id);
            devices.len() != before
        };
        if removed {
            self.notify(DeviceEvent::Disconnected(id.to_string()));
        }
        removed
    }

    fn notify(&self, event: DeviceEvent) {
        lock(&self.subscribers).retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }
}

impl CapabilitySource for SyntheticCapabilitySource {
    fn enumerate(&self) -> Result<Vec<DeviceDescriptor>, CameraError> {
        Ok(lock(&self.devices)
            .iter()
            .map(|(descriptor, _)| descriptor.clone())
            .collect())
    }

    fn capabilities(&self, device: &DeviceDescriptor) -> Result<CapabilityReport, CameraError> {
        lock(&self.devices)
            .iter()
            .find(|(descriptor, _)| descriptor.id == device.id)
            .map(|(_, report)| report.clone())
            .ok_or_else(|| CameraError::DeviceNotFound(device.id.clone()))
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<DeviceEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.subscribers).push(tx);
        rx
    }
}

#[derive(Default)]
struct BackendState {
    binds: Vec<BindRequest>,
    photo_requests: Vec<PhotoRequest>,
    pending_photos: VecDeque<(OutputTarget, PhotoCallback)>,
    video_requests: Vec<VideoRequest>,
    active_recording: Option<(OutputTarget, RecordingListener)>,
    pause_requests: usize,
    resume_requests: usize,
    stop_requests: usize,
    flash_modes: Vec<FlashMode>,
    zoom_ratios: Vec<f32>,
    exposure_indices: Vec<i32>,
    fail_next_bind: bool,
    fail_next_recording: bool,
}

/// Capture backend that records commands instead of driving hardware
#[derive(Clone)]
pub struct SyntheticCaptureBackend {
    auto_complete: bool,
    state: Arc<Mutex<BackendState>>,
}

impl Default for SyntheticCaptureBackend {
    fn default() -> Self {
        Self::manual()
    }
}

impl SyntheticCaptureBackend {
    /// Completions are delivered only when a test releases them
    pub fn manual() -> Self {
        Self {
            auto_complete: false,
            state: Arc::new(Mutex::new(BackendState::default())),
        }
    }

    /// Photos complete and recordings start/finalize synchronously
    pub fn auto_complete() -> Self {
        Self {
            auto_complete: true,
            ..Self::manual()
        }
    }

    pub fn fail_next_bind(&self) {
        lock(&self.state).fail_next_bind = true;
    }

    pub fn fail_next_recording(&self) {
        lock(&self.state).fail_next_recording = true;
    }

    pub fn bind_count(&self) -> usize {
        lock(&self.state).binds.len()
    }

    pub fn last_bind(&self) -> Option<BindRequest> {
        lock(&self.state).binds.last().cloned()
    }

    pub fn photo_request_count(&self) -> usize {
        lock(&self.state).photo_requests.len()
    }

    pub fn last_photo_request(&self) -> Option<PhotoRequest> {
        lock(&self.state).photo_requests.last().cloned()
    }

    pub fn pending_photo_count(&self) -> usize {
        lock(&self.state).pending_photos.len()
    }

    pub fn video_request_count(&self) -> usize {
        lock(&self.state).video_requests.len()
    }

    pub fn last_video_request(&self) -> Option<VideoRequest> {
        lock(&self.state).video_requests.last().cloned()
    }

    pub fn pause_request_count(&self) -> usize {
        lock(&self.state).pause_requests
    }

    pub fn resume_request_count(&self) -> usize {
        lock(&self.state).resume_requests
    }

    pub fn stop_request_count(&self) -> usize {
        lock(&self.state).stop_requests
    }

    pub fn flash_modes(&self) -> Vec<FlashMode> {
        lock(&self.state).flash_modes.clone()
    }

    pub fn zoom_ratios(&self) -> Vec<f32> {
        lock(&self.state).zoom_ratios.clone()
    }

    pub fn exposure_indices(&self) -> Vec<i32> {
        lock(&self.state).exposure_indices.clone()
    }

    /// Deliver the oldest pending photo result; returns whether one was pending
    pub fn complete_photo(&self, result: Result<(), CameraError>) -> bool {
        let pending = lock(&self.state).pending_photos.pop_front();
        match pending {
            Some((output, callback)) => {
                callback(result.map(|()| photo_output(output)));
                true
            }
            None => false,
        }
    }

    /// Confirm that the active recording is capturing frames
    pub fn confirm_recording_started(&self) -> bool {
        self.emit(RecordingEvent::Started)
    }

    pub fn report_recording_status(&self, duration: Duration, bytes_written: u64) -> bool {
        self.emit(RecordingEvent::Status {
            duration,
            bytes_written,
        })
    }

    /// Finalize the active recording; returns whether one was active
    pub fn finalize_recording(&self, result: Result<(), CameraError>) -> bool {
        let active = lock(&self.state).active_recording.take();
        match active {
            Some((output, listener)) => {
                listener(RecordingEvent::Finalized(
                    result.map(|()| video_output(output)),
                ));
                true
            }
            None => false,
        }
    }

    fn emit(&self, event: RecordingEvent) -> bool {
        let listener = lock(&self.state)
            .active_recording
            .as_ref()
            .map(|(_, listener)| Arc::clone(listener));
        match listener {
            Some(listener) => {
                listener(event);
                true
            }
            None => false,
        }
    }
}

fn photo_output(output: OutputTarget) -> PhotoOutput {
    PhotoOutput {
        saved_uri: Some(format!("synthetic://media/{}", output.file_name)),
        output,
    }
}

fn video_output(output: OutputTarget) -> VideoOutput {
    VideoOutput {
        output,
        duration: Duration::from_secs(1),
        bytes_written: 1_048_576,
    }
}

impl CaptureBackend for SyntheticCaptureBackend {
    fn bind(&self, request: &BindRequest) -> Result<(), CameraError> {
        let mut state = lock(&self.state);
        if std::mem::take(&mut state.fail_next_bind) {
            return Err(CameraError::BackendError(format!(
                "synthetic bind failure for {}",
                request.configuration.camera()
            )));
        }
        state.binds.push(request.clone());
        Ok(())
    }

    fn take_photo(&self, request: PhotoRequest, callback: PhotoCallback) {
        let output = request.output.clone();
        lock(&self.state).photo_requests.push(request);

        if self.auto_complete {
            callback(Ok(photo_output(output)));
        } else {
            lock(&self.state).pending_photos.push_back((output, callback));
        }
    }

    fn start_video_recording(
        &self,
        request: VideoRequest,
        listener: RecordingListener,
    ) -> Result<Arc<dyn RecordingHandle>, CameraError> {
        let output = request.output.clone();
        {
            let mut state = lock(&self.state);
            if std::mem::take(&mut state.fail_next_recording) {
                return Err(CameraError::RecordingError(
                    "synthetic encoder unavailable".to_string(),
                ));
            }
            state.video_requests.push(request);
            state.active_recording = Some((output, Arc::clone(&listener)));
        }

        if self.auto_complete {
            listener(RecordingEvent::Started);
        }

        Ok(Arc::new(SyntheticRecording {
            backend: self.clone(),
            finalized: AtomicBool::new(false),
        }))
    }

    fn set_flash_mode(&self, mode: FlashMode) {
        lock(&self.state).flash_modes.push(mode);
    }

    fn set_zoom_ratio(&self, ratio: f32) {
        lock(&self.state).zoom_ratios.push(ratio);
    }

    fn set_exposure_compensation(&self, index: i32) {
        lock(&self.state).exposure_indices.push(index);
    }
}

struct SyntheticRecording {
    backend: SyntheticCaptureBackend,
    finalized: AtomicBool,
}

impl RecordingHandle for SyntheticRecording {
    fn pause(&self) {
        lock(&self.backend.state).pause_requests += 1;
        self.backend.emit(RecordingEvent::Paused);
    }

    fn resume(&self) {
        lock(&self.backend.state).resume_requests += 1;
        self.backend.emit(RecordingEvent::Resumed);
    }

    fn stop(&self) {
        lock(&self.backend.state).stop_requests += 1;
        if self.backend.auto_complete && !self.finalized.swap(true, Ordering::SeqCst) {
            self.backend.finalize_recording(Ok(()));
        }
    }
}
