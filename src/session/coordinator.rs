//! Session coordinator
//!
//! Serializes every reconfiguration of the camera session through
//! [`SessionCoordinator::update_configuration`]:
//!
//! 1. refuse while a capture is in progress,
//! 2. take the rebind lock without waiting, refusing when it is held,
//! 3. refuse when the bound configuration is not of the requested variant,
//! 4. transform, reconcile against the camera, validate, bind, publish.
//!
//! Capture triggers return as soon as the hardware command is issued. Their
//! completions arrive through backend callbacks, which drive the capture
//! state machine and publish [`SessionEvent`]s.

use super::capture_state::{CaptureState, CaptureStateMachine, PhotoTransition, VideoTransition};
use super::views::{self, LiveViews};
use super::zoom::ZoomController;
use super::{CaptureOutcome, SessionEvent, UpdateOutcome};
use crate::assert_invariant;
use crate::catalog::DeviceCatalog;
use crate::config::{SessionConfig, ZoomConfig};
use crate::configuration::{
    cycle, initial_configuration, Configuration, ConfigurationOverrides, ConfigurationVariant,
    PhotoConfiguration, VideoConfiguration,
};
use crate::device::{Device, PRIMARY_BACK_ID};
use crate::environment::Environment;
use crate::errors::CameraError;
use crate::observable::Observable;
use crate::platform::{
    AudioConfig, BindRequest, CapabilitySource, CaptureBackend, CaptureMetadata, OutputTarget,
    PhotoOutput, PhotoRequest, RecordingEvent, RecordingHandle, RecordingListener, VideoRequest,
};
use crate::preferences::{keys, PreferenceKey, PreferenceSnapshot, Preferences};
use crate::types::{CaptureMode, Facing, FlashMode};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError, Weak};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Inner {
    catalog: Arc<DeviceCatalog>,
    backend: Arc<dyn CaptureBackend>,
    preferences: Preferences,
    environment: Environment,

    configuration: Observable<Configuration>,
    capture_state: CaptureStateMachine,
    views: Observable<LiveViews>,
    zoom: ZoomController,
    exposure_index: Observable<i32>,

    rebind_lock: Mutex<()>,
    /// The bound camera left the device list but the fallback was refused
    fallback_pending: AtomicBool,
    /// Last flash mode sent to the hardware; held while views are recomputed
    applied_flash: Mutex<Option<FlashMode>>,
    recording: Mutex<Option<Arc<dyn RecordingHandle>>>,
    countdown: Mutex<Option<JoinHandle<()>>>,
    reactor: Mutex<Option<JoinHandle<()>>>,

    event_sender: mpsc::UnboundedSender<SessionEvent>,
    event_receiver: AsyncMutex<mpsc::UnboundedReceiver<SessionEvent>>,
}

impl Inner {
    fn emit(&self, event: SessionEvent) {
        let _ = self.event_sender.send(event);
    }

    fn on_photo_result(&self, result: Result<PhotoOutput, CameraError>) {
        self.capture_state.finish_photo();
        match result {
            Ok(output) => {
                log::info!("Photo saved as {}", output.output.file_name);
                self.emit(SessionEvent::PhotoCaptured(output));
            }
            Err(e) => {
                log::warn!("Photo capture failed: {}", e);
                self.emit(SessionEvent::PhotoFailed(e));
            }
        }
    }

    fn on_recording_event(&self, event: RecordingEvent) {
        match event {
            RecordingEvent::Started => {
                if self.capture_state.recording_started() {
                    log::info!("Recording started");
                    self.emit(SessionEvent::RecordingStarted);
                }
            }
            RecordingEvent::Status {
                duration,
                bytes_written,
            } => self.emit(SessionEvent::RecordingStatus {
                duration,
                bytes_written,
            }),
            RecordingEvent::Paused => self.emit(SessionEvent::RecordingPaused),
            RecordingEvent::Resumed => self.emit(SessionEvent::RecordingResumed),
            RecordingEvent::Finalized(result) => {
                {
                    let mut handle = lock(&self.recording);
                    handle.take();
                    self.capture_state.recording_finalized();
                }
                match &result {
                    Ok(output) => log::info!(
                        "Recording {} finalized ({} bytes)",
                        output.output.file_name,
                        output.bytes_written
                    ),
                    Err(e) => log::warn!("Recording failed: {}", e),
                }
                self.emit(SessionEvent::RecordingFinalized(result));
            }
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        for task in [&self.reactor, &self.countdown] {
            if let Some(handle) = lock(task).take() {
                handle.abort();
            }
        }
    }
}

/// Shared handle to a camera session
#[derive(Clone)]
pub struct SessionCoordinator {
    inner: Arc<Inner>,
}

impl SessionCoordinator {
    /// Bind the initial configuration and build the session.
    ///
    /// The camera is the last one used when it is still available, else the
    /// primary back camera, else the first camera in the catalog.
    pub fn new(
        catalog: Arc<DeviceCatalog>,
        backend: Arc<dyn CaptureBackend>,
        preferences: Preferences,
        environment: Environment,
        zoom: ZoomConfig,
    ) -> Result<Self, CameraError> {
        let snapshot = preferences.snapshot();
        let camera = default_camera(&catalog, snapshot.last_camera_id.as_deref())
            .ok_or_else(|| CameraError::DeviceNotFound("no camera available".to_string()))?;

        let configuration = initial_configuration(
            camera,
            snapshot.last_capture_mode,
            &snapshot,
            catalog.policy(),
        )
        .reconcile();
        configuration.validate()?;
        backend.bind(&bind_request(&configuration, &snapshot))?;
        log::info!(
            "Session started on {} in {} mode",
            configuration.camera(),
            configuration.capture_mode()
        );

        let live_views = views::compute(&configuration, &snapshot, &environment.snapshot());
        let flash_mode = live_views.flash_mode;
        backend.set_flash_mode(flash_mode);

        let (event_sender, event_receiver) = mpsc::unbounded_channel();
        let inner = Inner {
            zoom: ZoomController::new(Arc::clone(&backend), zoom),
            catalog,
            backend,
            preferences,
            environment,
            configuration: Observable::new(configuration),
            capture_state: CaptureStateMachine::new(),
            views: Observable::new(live_views),
            exposure_index: Observable::new(0),
            rebind_lock: Mutex::new(()),
            fallback_pending: AtomicBool::new(false),
            applied_flash: Mutex::new(Some(flash_mode)),
            recording: Mutex::new(None),
            countdown: Mutex::new(None),
            reactor: Mutex::new(None),
            event_sender,
            event_receiver: AsyncMutex::new(event_receiver),
        };

        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Session over a fresh catalog, seeded from a loaded [`SessionConfig`]
    pub fn from_config(
        source: Arc<dyn CapabilitySource>,
        backend: Arc<dyn CaptureBackend>,
        config: &SessionConfig,
    ) -> Result<Self, CameraError> {
        let catalog = Arc::new(DeviceCatalog::new(source, config.policy.clone())?);
        Self::new(
            catalog,
            backend,
            Preferences::new(config.preferences.clone()),
            Environment::new(),
            config.zoom.clone(),
        )
    }

    pub fn catalog(&self) -> &Arc<DeviceCatalog> {
        &self.inner.catalog
    }

    pub fn preferences(&self) -> &Preferences {
        &self.inner.preferences
    }

    pub fn environment(&self) -> &Environment {
        &self.inner.environment
    }

    pub fn configuration(&self) -> Configuration {
        self.inner.configuration.get()
    }

    pub fn subscribe_configuration(&self) -> watch::Receiver<Configuration> {
        self.inner.configuration.subscribe()
    }

    pub fn capture_state(&self) -> CaptureState {
        self.inner.capture_state.get()
    }

    pub fn subscribe_capture_state(&self) -> watch::Receiver<CaptureState> {
        self.inner.capture_state.subscribe()
    }

    pub fn views(&self) -> LiveViews {
        self.inner.views.get()
    }

    pub fn subscribe_views(&self) -> watch::Receiver<LiveViews> {
        self.inner.views.subscribe()
    }

    pub fn zoom_ratio(&self) -> f32 {
        self.inner.zoom.ratio()
    }

    pub fn exposure_compensation(&self) -> i32 {
        self.inner.exposure_index.get()
    }

    /// Get next session event (non-blocking)
    pub async fn poll_event(&self) -> Option<SessionEvent> {
        let mut rx = self.inner.event_receiver.lock().await;
        rx.try_recv().ok()
    }

    /// Wait for next session event
    pub async fn wait_for_event(&self) -> Option<SessionEvent> {
        let mut rx = self.inner.event_receiver.lock().await;
        rx.recv().await
    }

    fn try_rebind_lock(&self) -> Option<MutexGuard<'_, ()>> {
        match self.inner.rebind_lock.try_lock() {
            Ok(guard) => Some(guard),
            Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => None,
        }
    }

    /// Replace the bound configuration with `transform` of the current one.
    ///
    /// `V` scopes the update to one configuration variant; use
    /// [`Configuration`] itself for updates valid in every mode. Soft
    /// rejections are returned as outcomes. Errors mean the transformed
    /// configuration failed validation or binding, in which case the
    /// previous configuration stays bound.
    pub fn update_configuration<V, F>(&self, transform: F) -> Result<UpdateOutcome, CameraError>
    where
        V: ConfigurationVariant,
        F: FnOnce(&V) -> Configuration,
    {
        let outcome = self.update_under_lock(transform);
        // The rebind lock was held; a fallback refused meanwhile can run now
        if !matches!(
            outcome,
            Ok(UpdateOutcome::Busy | UpdateOutcome::CaptureInProgress)
        ) {
            self.retry_camera_fallback();
        }
        outcome
    }

    fn update_under_lock<V, F>(&self, transform: F) -> Result<UpdateOutcome, CameraError>
    where
        V: ConfigurationVariant,
        F: FnOnce(&V) -> Configuration,
    {
        if !self.inner.capture_state.is_idle() {
            log::debug!(
                "Configuration update refused while {}",
                self.inner.capture_state.get()
            );
            return Ok(UpdateOutcome::CaptureInProgress);
        }

        let Some(_guard) = self.try_rebind_lock() else {
            log::debug!("Configuration update dropped, rebind in progress");
            return Ok(UpdateOutcome::Busy);
        };

        // A capture may have started between the state check and the lock
        if !self.inner.capture_state.is_idle() {
            return Ok(UpdateOutcome::CaptureInProgress);
        }

        let current = self.inner.configuration.get();
        let Some(variant) = V::extract(&current) else {
            log::debug!(
                "Configuration update does not apply in {} mode",
                current.capture_mode()
            );
            return Ok(UpdateOutcome::ModeMismatch);
        };

        let next = transform(variant).reconcile();
        if next == current {
            return Ok(UpdateOutcome::Unchanged);
        }

        self.bind_and_publish(&current, next)?;
        Ok(UpdateOutcome::Applied)
    }

    /// Caller holds the rebind lock
    fn bind_and_publish(
        &self,
        previous: &Configuration,
        next: Configuration,
    ) -> Result<(), CameraError> {
        let inner = &self.inner;

        if let Err(e) = next.validate() {
            log::error!("Rejected configuration: {}", e);
            inner.emit(SessionEvent::ConfigurationRejected(e.clone()));
            return Err(e);
        }

        let snapshot = inner.preferences.snapshot();
        if let Err(e) = inner.backend.bind(&bind_request(&next, &snapshot)) {
            log::warn!("Failed to bind {}: {}", next.camera(), e);
            inner.emit(SessionEvent::ConfigurationRejected(e.clone()));
            return Err(e);
        }

        let camera_changed = previous.camera().id != next.camera().id;
        let camera_id = next.camera().id.clone();
        let capture_mode = next.capture_mode();
        log::info!("Applied {} configuration on {}", capture_mode, next.camera());
        inner.configuration.set(next.clone());

        inner.preferences.update(|snapshot| {
            snapshot.last_camera_id = Some(camera_id.clone());
            snapshot.last_capture_mode = capture_mode;
        });

        if camera_changed {
            inner.zoom.reset(next.capabilities());
            self.set_exposure_compensation(0);
        }
        self.refresh_views();

        inner.emit(SessionEvent::ConfigurationApplied {
            camera_id,
            capture_mode,
        });
        Ok(())
    }

    /// Recompute the live views, then push a changed flash mode to the hardware
    pub fn refresh_views(&self) {
        let inner = &self.inner;
        let mut applied_flash = lock(&inner.applied_flash);

        let live_views = inner.configuration.with(|configuration| {
            views::compute(
                configuration,
                &inner.preferences.snapshot(),
                &inner.environment.snapshot(),
            )
        });
        let flash_mode = live_views.flash_mode;
        inner.views.set_if_changed(live_views);

        if *applied_flash != Some(flash_mode) {
            log::debug!("Applying flash mode {:?}", flash_mode);
            *applied_flash = Some(flash_mode);
            inner.backend.set_flash_mode(flash_mode);
        }
    }

    /// Store a preference and refresh the views it may affect
    pub fn set_preference<T: PartialEq>(&self, key: &PreferenceKey<T>, value: T) -> bool {
        let changed = self.inner.preferences.set(key, value);
        if changed {
            self.refresh_views();
        }
        changed
    }

    fn persist<V, T>(
        &self,
        outcome: UpdateOutcome,
        key: &PreferenceKey<T>,
        value: impl FnOnce(&V) -> T,
    ) -> UpdateOutcome
    where
        V: ConfigurationVariant,
        T: PartialEq,
    {
        if outcome.is_applied() {
            let configuration = self.inner.configuration.get();
            if let Some(variant) = V::extract(&configuration) {
                self.inner.preferences.set(key, value(variant));
            }
        }
        outcome
    }

    pub fn select_camera(&self, camera_id: &str) -> Result<UpdateOutcome, CameraError> {
        let camera = self
            .inner
            .catalog
            .device(camera_id)
            .ok_or_else(|| CameraError::DeviceNotFound(camera_id.to_string()))?;
        self.select_device(camera)
    }

    fn select_device(&self, camera: Arc<Device>) -> Result<UpdateOutcome, CameraError> {
        self.update_configuration::<Configuration, _>(|configuration| {
            configuration.clone_with(ConfigurationOverrides::camera(camera))
        })
    }

    /// Switch to the next facing that has a camera
    pub fn flip_camera(&self) -> Result<UpdateOutcome, CameraError> {
        let facing = self.inner.configuration.with(|c| c.camera().facing);
        let devices = self.inner.catalog.devices();
        match next_facing_camera(&devices, facing) {
            Some(camera) => {
                log::debug!("Flipping from {} to {}", facing, camera);
                self.select_device(camera)
            }
            None => {
                log::debug!("No camera facing away from {}", facing);
                Ok(UpdateOutcome::NothingToCycle)
            }
        }
    }

    /// Switch capture mode, starting the new mode from the stored preferences
    pub fn set_capture_mode(&self, mode: CaptureMode) -> Result<UpdateOutcome, CameraError> {
        let snapshot = self.inner.preferences.snapshot();
        let policy = self.inner.catalog.policy();
        self.update_configuration::<Configuration, _>(|configuration| {
            if configuration.capture_mode() == mode {
                configuration.clone()
            } else {
                initial_configuration(Arc::clone(configuration.camera()), mode, &snapshot, policy)
            }
        })
    }

    pub fn cycle_aspect_ratio(&self) -> Result<UpdateOutcome, CameraError> {
        let outcome = self.update_configuration::<PhotoConfiguration, _>(cycle::aspect_ratio)?;
        Ok(self.persist(outcome, &keys::ASPECT_RATIO, |photo: &PhotoConfiguration| {
            photo.aspect_ratio
        }))
    }

    pub fn cycle_extension_mode(&self) -> Result<UpdateOutcome, CameraError> {
        let outcome = self.update_configuration::<PhotoConfiguration, _>(cycle::extension_mode)?;
        Ok(self.persist(outcome, &keys::EXTENSION_MODE, |photo: &PhotoConfiguration| {
            photo.effect_mode
        }))
    }

    pub fn toggle_high_resolution(&self) -> Result<UpdateOutcome, CameraError> {
        self.update_configuration::<PhotoConfiguration, _>(cycle::high_resolution)
    }

    /// Next video quality; frame rate and dynamic range follow the new quality
    pub fn cycle_video_quality(&self) -> Result<UpdateOutcome, CameraError> {
        let snapshot = self.inner.preferences.snapshot();
        let outcome = self.update_configuration::<VideoConfiguration, _>(|video| {
            cycle::video_quality(
                video,
                snapshot.video_frame_rate,
                snapshot.video_dynamic_range,
            )
        })?;
        Ok(self.persist(outcome, &keys::VIDEO_QUALITY, |video: &VideoConfiguration| {
            Some(video.quality)
        }))
    }

    pub fn cycle_frame_rate(&self) -> Result<UpdateOutcome, CameraError> {
        let outcome = self.update_configuration::<VideoConfiguration, _>(cycle::frame_rate)?;
        Ok(self.persist(outcome, &keys::VIDEO_FRAME_RATE, |video: &VideoConfiguration| {
            video.frame_rate
        }))
    }

    pub fn cycle_dynamic_range(&self) -> Result<UpdateOutcome, CameraError> {
        let outcome = self.update_configuration::<VideoConfiguration, _>(cycle::dynamic_range)?;
        Ok(self.persist(outcome, &keys::VIDEO_DYNAMIC_RANGE, |video: &VideoConfiguration| {
            video.dynamic_range
        }))
    }

    pub fn cycle_video_mirror_mode(&self) -> Result<UpdateOutcome, CameraError> {
        let outcome =
            self.update_configuration::<VideoConfiguration, _>(cycle::video_mirror_mode)?;
        Ok(self.persist(outcome, &keys::VIDEO_MIRROR_MODE, |video: &VideoConfiguration| {
            video.mirror_mode
        }))
    }

    pub fn toggle_video_stabilization(&self) -> Result<UpdateOutcome, CameraError> {
        let outcome =
            self.update_configuration::<VideoConfiguration, _>(cycle::video_stabilization)?;
        Ok(self.persist(outcome, &keys::VIDEO_STABILIZATION, |video: &VideoConfiguration| {
            video.stabilization_enabled
        }))
    }

    /// Advance the wanted flash mode of the current capture mode; returns the new wanted mode
    pub fn cycle_flash_mode(&self) -> FlashMode {
        let (mode, supported) = self.inner.configuration.with(|configuration| {
            let mode = configuration.capture_mode();
            (mode, views::supported_flash_modes(mode, configuration.capabilities()))
        });
        let key = keys::flash_mode_for(mode);
        let next = views::next_flash_mode(&supported, self.inner.preferences.get(&key));
        self.set_preference(&key, next);
        next
    }

    /// Flip the force-torch preference; returns the new value
    pub fn toggle_force_torch(&self) -> bool {
        let enabled = !self.inner.preferences.get(&keys::FORCE_TORCH);
        self.set_preference(&keys::FORCE_TORCH, enabled);
        enabled
    }

    /// Clamp to the camera's range, publish, then apply; returns the applied index
    pub fn set_exposure_compensation(&self, index: i32) -> i32 {
        let clamped = self
            .bound_camera()
            .capabilities
            .clamp_exposure_compensation(index);
        if self.inner.exposure_index.set_if_changed(clamped) {
            self.inner.backend.set_exposure_compensation(clamped);
        }
        clamped
    }

    fn bound_camera(&self) -> Arc<Device> {
        self.inner.configuration.with(|c| Arc::clone(c.camera()))
    }

    pub fn set_zoom_ratio(&self, ratio: f32) -> f32 {
        self.inner.zoom.set_ratio(&self.bound_camera().capabilities, ratio)
    }

    /// Animate the zoom towards `target`; `None` when an animation is already running
    pub fn smooth_zoom(&self, target: f32) -> Option<JoinHandle<()>> {
        self.inner.zoom.smooth_zoom(&self.bound_camera().capabilities, target)
    }

    /// Jump to a discrete zoom preset through the logical zoom table
    pub fn zoom_to_preset(&self, ratio: f32) -> f32 {
        let camera = self.bound_camera();
        let effective = camera.capabilities.effective_zoom_ratio(ratio);
        self.inner.zoom.set_ratio(&camera.capabilities, effective)
    }

    fn capture_metadata(&self, configuration: &Configuration) -> CaptureMetadata {
        let environment = self.inner.environment.snapshot();
        let save_location = self.inner.preferences.get(&keys::SAVE_LOCATION);
        CaptureMetadata {
            captured_at: Utc::now(),
            orientation: environment.orientation,
            location: environment.location.filter(|_| save_location),
            flash_mode: self.inner.views.with(|v| v.flash_mode),
            mirrored: configuration.is_mirrored(),
        }
    }

    /// Take a photo now.
    ///
    /// From a running countdown the countdown is consumed. A request while a
    /// photo is being taken does not reach the hardware.
    pub fn take_photo(&self) -> CaptureOutcome {
        self.retry_camera_fallback();
        let configuration = self.inner.configuration.get();
        if configuration.capture_mode() != CaptureMode::Photo {
            return CaptureOutcome::WrongMode(configuration.capture_mode());
        }

        let Some(guard) = self.try_rebind_lock() else {
            log::debug!("Photo request dropped, rebind in progress");
            return CaptureOutcome::Busy;
        };
        let transition = self.inner.capture_state.begin_photo();
        drop(guard);

        match transition {
            PhotoTransition::Started => {}
            PhotoTransition::AlreadyTaking => {
                log::debug!("Photo already in progress");
                return CaptureOutcome::AlreadyInProgress;
            }
            PhotoTransition::NotAllowed(state) => {
                log::debug!("Photo request refused while {}", state);
                return CaptureOutcome::NotAllowed(state);
            }
        }

        if let Some(countdown) = lock(&self.inner.countdown).take() {
            countdown.abort();
        }

        let request = PhotoRequest {
            output: OutputTarget::for_capture(CaptureMode::Photo, Utc::now()),
            metadata: self.capture_metadata(&configuration),
        };
        log::info!("Taking photo {}", request.output.file_name);

        let inner = Arc::downgrade(&self.inner);
        self.inner.backend.take_photo(
            request,
            Box::new(move |result| {
                if let Some(inner) = inner.upgrade() {
                    inner.on_photo_result(result);
                    SessionCoordinator { inner }.retry_camera_fallback();
                }
            }),
        );
        CaptureOutcome::Started
    }

    /// Take a photo after the self-timer stored in the preferences
    pub fn take_photo_with_timer(&self) -> CaptureOutcome {
        self.retry_camera_fallback();
        let Some(delay) = self.inner.preferences.get(&keys::TIMER_MODE).duration() else {
            return self.take_photo();
        };
        let mode = self.inner.configuration.with(Configuration::capture_mode);
        if mode != CaptureMode::Photo {
            return CaptureOutcome::WrongMode(mode);
        }
        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                log::warn!("Self-timer needs a tokio runtime ({}), shooting now", e);
                return self.take_photo();
            }
        };

        let Some(guard) = self.try_rebind_lock() else {
            return CaptureOutcome::Busy;
        };
        if !self.inner.capture_state.begin_countdown() {
            let state = self.inner.capture_state.get();
            return if state == CaptureState::Countdown {
                CaptureOutcome::AlreadyInProgress
            } else {
                CaptureOutcome::NotAllowed(state)
            };
        }
        drop(guard);

        log::info!("Self-timer started, {}s", delay.as_secs());
        let weak = Arc::downgrade(&self.inner);
        let mut countdown = lock(&self.inner.countdown);
        *countdown = Some(runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            lock(&inner.countdown).take();
            let session = SessionCoordinator { inner };
            if session.capture_state() != CaptureState::Countdown {
                return;
            }
            if session.take_photo() == CaptureOutcome::Busy && session.cancel_countdown() {
                log::warn!("Self-timer photo dropped, rebind in progress");
            }
        }));
        drop(countdown);

        self.inner.emit(SessionEvent::CountdownStarted(delay));
        CaptureOutcome::Started
    }

    /// Abort a running self-timer; returns whether one was running
    pub fn cancel_countdown(&self) -> bool {
        if !self.inner.capture_state.cancel_countdown() {
            return false;
        }
        if let Some(countdown) = lock(&self.inner.countdown).take() {
            countdown.abort();
        }
        log::info!("Self-timer cancelled");
        self.inner.emit(SessionEvent::CountdownCancelled);
        self.retry_camera_fallback();
        true
    }

    /// Start recording, or stop the active recording.
    ///
    /// A failure to start is also published as a failed
    /// [`SessionEvent::RecordingFinalized`] and returns the session to idle.
    pub fn capture_video(&self) -> Result<CaptureOutcome, CameraError> {
        self.retry_camera_fallback();
        let configuration = self.inner.configuration.get();
        if configuration.capture_mode() != CaptureMode::Video {
            return Ok(CaptureOutcome::WrongMode(configuration.capture_mode()));
        }

        let Some(guard) = self.try_rebind_lock() else {
            log::debug!("Video request dropped, rebind in progress");
            return Ok(CaptureOutcome::Busy);
        };
        let transition = self.inner.capture_state.request_video();
        drop(guard);

        match transition {
            VideoTransition::Start => {}
            VideoTransition::Stop => {
                self.stop_recording();
                return Ok(CaptureOutcome::StopRequested);
            }
            VideoTransition::NotAllowed(state) => {
                log::debug!("Video request refused while {}", state);
                return Ok(CaptureOutcome::NotAllowed(state));
            }
        }

        let request = VideoRequest {
            output: OutputTarget::for_capture(CaptureMode::Video, Utc::now()),
            metadata: self.capture_metadata(&configuration),
            audio: AudioConfig {
                enabled: self.inner.preferences.get(&keys::VIDEO_MIC_ENABLED),
            },
        };
        log::info!("Starting recording {}", request.output.file_name);

        let inner = Arc::downgrade(&self.inner);
        let listener: RecordingListener = Arc::new(move |event| {
            if let Some(inner) = inner.upgrade() {
                let finalized = matches!(event, RecordingEvent::Finalized(_));
                inner.on_recording_event(event);
                if finalized {
                    SessionCoordinator { inner }.retry_camera_fallback();
                }
            }
        });

        match self.inner.backend.start_video_recording(request, listener) {
            Ok(handle) => {
                let mut slot = lock(&self.inner.recording);
                if self.inner.capture_state.get().is_recording() {
                    *slot = Some(handle);
                } else {
                    log::debug!("Recording finalized before its handle was stored");
                }
                Ok(CaptureOutcome::Started)
            }
            Err(e) => {
                log::warn!("Failed to start recording: {}", e);
                self.inner.capture_state.recording_finalized();
                self.inner.emit(SessionEvent::RecordingFinalized(Err(e.clone())));
                self.retry_camera_fallback();
                Err(e)
            }
        }
    }

    /// Ask the active recording to stop; returns whether one was active
    pub fn stop_recording(&self) -> bool {
        let handle = lock(&self.inner.recording).clone();
        match handle {
            Some(handle) => {
                log::info!("Stopping recording");
                handle.stop();
                true
            }
            None => false,
        }
    }

    /// Pause the active recording. Calling this outside an active, unpaused
    /// recording is a usage error and panics.
    pub fn pause_recording(&self) {
        self.inner.capture_state.pause_recording();
        let handle = lock(&self.inner.recording).clone();
        match handle {
            Some(handle) => handle.pause(),
            None => log::warn!("Recording paused before its handle was available"),
        }
    }

    /// Resume a paused recording. Calling this outside a paused recording is
    /// a usage error and panics.
    pub fn resume_recording(&self) {
        self.inner.capture_state.resume_recording();
        let handle = lock(&self.inner.recording).clone();
        match handle {
            Some(handle) => handle.resume(),
            None => log::warn!("Recording resumed before its handle was available"),
        }
    }

    /// Fall back to the default camera when the bound one left the device list.
    ///
    /// A fallback refused as `Busy` or `CaptureInProgress` stays pending and
    /// is retried once the session is idle and the rebind lock is free.
    pub fn handle_device_list_change(&self) -> Result<UpdateOutcome, CameraError> {
        let camera_id = self.inner.configuration.with(|c| c.camera().id.clone());
        if self.inner.catalog.device(&camera_id).is_some() {
            self.inner.fallback_pending.store(false, Ordering::SeqCst);
            return Ok(UpdateOutcome::Unchanged);
        }

        if !self.inner.fallback_pending.load(Ordering::SeqCst) {
            log::warn!("Bound camera {} is no longer available", camera_id);
            self.inner.emit(SessionEvent::CameraLost { camera_id });
        }
        self.fall_back_to_default_camera()
    }

    fn fall_back_to_default_camera(&self) -> Result<UpdateOutcome, CameraError> {
        self.inner.fallback_pending.store(false, Ordering::SeqCst);
        let fallback = default_camera(&self.inner.catalog, None)
            .ok_or_else(|| CameraError::DeviceNotFound("no camera available".to_string()))?;
        let outcome = self.select_device(fallback)?;
        if matches!(outcome, UpdateOutcome::Busy | UpdateOutcome::CaptureInProgress) {
            log::debug!("Camera fallback deferred ({:?})", outcome);
            self.inner.fallback_pending.store(true, Ordering::SeqCst);
        }
        Ok(outcome)
    }

    /// Whether the session is still bound to a camera that left the device list
    pub fn is_fallback_pending(&self) -> bool {
        self.inner.fallback_pending.load(Ordering::SeqCst)
    }

    /// Run a deferred fallback; refused again, it stays pending
    fn retry_camera_fallback(&self) {
        if !self.is_fallback_pending() {
            return;
        }
        match self.handle_device_list_change() {
            Ok(outcome) if outcome.is_applied() => log::info!("Deferred camera fallback applied"),
            Ok(_) => {}
            Err(e) => log::warn!("Deferred camera fallback failed: {}", e),
        }
    }

    /// Recompute views whenever preferences, environment or the device list change
    pub fn start_reactor(&self) -> Result<(), CameraError> {
        let mut reactor = lock(&self.inner.reactor);
        if reactor.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return Ok(());
        }

        let runtime = Handle::try_current().map_err(|e| {
            CameraError::InitializationError(format!(
                "Session reactor needs a tokio runtime: {}",
                e
            ))
        })?;

        let mut preferences = self.inner.preferences.subscribe();
        let mut environment = self.inner.environment.subscribe();
        let mut devices = self.inner.catalog.subscribe();
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);

        *reactor = Some(runtime.spawn(async move {
            loop {
                let changed = tokio::select! {
                    r = preferences.changed() => r.map(|()| false),
                    r = environment.thermal.changed() => r.map(|()| false),
                    r = environment.orientation.changed() => r.map(|()| false),
                    r = environment.location.changed() => r.map(|()| false),
                    r = environment.battery.changed() => r.map(|()| false),
                    r = devices.changed() => r.map(|()| true),
                };
                let Ok(devices_changed) = changed else {
                    break;
                };
                let Some(inner) = weak.upgrade() else {
                    break;
                };

                let session = SessionCoordinator { inner };
                if devices_changed {
                    if let Err(e) = session.handle_device_list_change() {
                        log::warn!("Could not recover from device list change: {}", e);
                    }
                }
                session.refresh_views();
            }
            log::debug!("Session reactor stopped");
        }));

        log::info!("Session reactor started");
        Ok(())
    }

    pub fn stop_reactor(&self) {
        if let Some(handle) = lock(&self.inner.reactor).take() {
            handle.abort();
        }
    }
}

fn bind_request(configuration: &Configuration, preferences: &PreferenceSnapshot) -> BindRequest {
    BindRequest {
        configuration: configuration.clone(),
        sensor_tuning: configuration
            .capabilities()
            .resolve_sensor_tuning(preferences, configuration.tuning_context()),
    }
}

/// Preferred camera, else the primary back camera, else the first one listed
fn default_camera(catalog: &DeviceCatalog, preferred: Option<&str>) -> Option<Arc<Device>> {
    preferred
        .and_then(|id| catalog.device(id))
        .or_else(|| catalog.device(PRIMARY_BACK_ID))
        .or_else(|| catalog.devices().into_iter().next())
}

/// Camera to flip to from `current`.
///
/// Facings are visited in [`Facing::FLIP_ORDER`] starting after `current`.
/// Within a facing the primary camera wins over the first listed one.
/// Returns `None` when no other facing has a camera.
pub fn next_facing_camera(devices: &[Arc<Device>], current: Facing) -> Option<Arc<Device>> {
    assert_invariant!(
        !devices.is_empty(),
        "At least one camera facing group must exist",
        "flip camera"
    );

    let order = Facing::FLIP_ORDER;
    let start = order.iter().position(|facing| *facing == current).unwrap_or(0);
    (1..order.len())
        .map(|offset| order[(start + offset) % order.len()])
        .find_map(|facing| {
            let group: Vec<&Arc<Device>> =
                devices.iter().filter(|device| device.facing == facing).collect();
            let primary = Device::primary_id_for(facing)
                .and_then(|id| group.iter().find(|device| device.id == id));
            primary.or_else(|| group.first()).map(|device| Arc::clone(*device))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixtures, SyntheticCapabilitySource, SyntheticCaptureBackend};
    use crate::types::AspectRatio;

    fn session() -> (SessionCoordinator, SyntheticCaptureBackend) {
        let backend = SyntheticCaptureBackend::manual();
        let catalog = DeviceCatalog::new(
            Arc::new(SyntheticCapabilitySource::reference()),
            fixtures::reference_policy(),
        )
        .expect("catalog");
        let session = SessionCoordinator::new(
            Arc::new(catalog),
            Arc::new(backend.clone()),
            Preferences::default(),
            Environment::new(),
            ZoomConfig::default(),
        )
        .expect("session");
        (session, backend)
    }

    #[test]
    fn test_starts_on_primary_back_camera() {
        let (session, backend) = session();
        let configuration = session.configuration();
        assert_eq!(configuration.camera().id, PRIMARY_BACK_ID);
        assert_eq!(configuration.capture_mode(), CaptureMode::Photo);
        assert_eq!(backend.bind_count(), 1);
        assert_eq!(backend.flash_modes(), vec![FlashMode::Off]);
    }

    #[test]
    fn test_flip_prefers_primary_of_next_facing() {
        let back = fixtures::back_camera();
        let front = fixtures::front_camera();
        let devices = vec![Arc::clone(&back), Arc::clone(&front)];

        let target = next_facing_camera(&devices, Facing::Back).expect("front camera");
        assert_eq!(target.id, "1");
        let target = next_facing_camera(&devices, Facing::Front).expect("back camera");
        assert_eq!(target.id, "0");
        assert!(next_facing_camera(&[back], Facing::Back).is_none());
    }

    #[test]
    #[should_panic(expected = "At least one camera facing group must exist")]
    fn test_flip_without_devices_is_fatal() {
        next_facing_camera(&[], Facing::Back);
    }

    #[test]
    fn test_update_rejected_while_rebind_lock_held() {
        let (session, backend) = session();
        let _guard = session.inner.rebind_lock.lock().expect("lock");
        assert_eq!(session.flip_camera().expect("flip"), UpdateOutcome::Busy);
        assert_eq!(session.take_photo(), CaptureOutcome::Busy);
        assert_eq!(backend.bind_count(), 1);
    }

    #[test]
    fn test_fallback_refused_while_busy_runs_after_next_rebind() {
        let source = Arc::new(SyntheticCapabilitySource::reference());
        source.attach(fixtures::external_camera("usb-1"));
        let shared: Arc<dyn CapabilitySource> = Arc::clone(&source) as _;
        let catalog =
            Arc::new(DeviceCatalog::new(shared, fixtures::reference_policy()).expect("catalog"));
        let session = SessionCoordinator::new(
            Arc::clone(&catalog),
            Arc::new(SyntheticCaptureBackend::manual()),
            Preferences::default(),
            Environment::new(),
            ZoomConfig::default(),
        )
        .expect("session");
        session.select_camera("usb-1").expect("select");

        source.detach("usb-1");
        catalog.refresh_external().expect("refresh");
        {
            let _guard = session.inner.rebind_lock.lock().expect("lock");
            assert_eq!(
                session.handle_device_list_change().expect("fallback"),
                UpdateOutcome::Busy
            );
        }
        assert!(session.is_fallback_pending());

        session.toggle_high_resolution().expect("toggle");
        assert_eq!(session.configuration().camera().id, PRIMARY_BACK_ID);
        assert!(!session.is_fallback_pending());
    }

    #[test]
    fn test_camera_change_resets_zoom_and_exposure() {
        let (session, backend) = session();
        session.set_zoom_ratio(3.0);
        session.set_exposure_compensation(6);

        assert!(session.flip_camera().expect("flip").is_applied());
        assert_eq!(session.zoom_ratio(), 1.0);
        assert_eq!(session.exposure_compensation(), 0);
        assert_eq!(backend.zoom_ratios(), vec![3.0, 1.0]);
        assert_eq!(backend.exposure_indices(), vec![6, 0]);
    }

    #[test]
    fn test_failed_bind_keeps_previous_configuration() {
        let (session, backend) = session();
        let before = session.configuration();
        backend.fail_next_bind();

        assert!(session.cycle_aspect_ratio().is_err());
        assert_eq!(session.configuration(), before);
        assert_eq!(
            session.preferences().get(&keys::ASPECT_RATIO),
            AspectRatio::default()
        );
    }
}
