//! Zoom control
//!
//! Direct zoom requests are clamped and applied at once. Smooth zoom animates
//! towards a target on a tokio task holding the zoom lock; a request arriving
//! while an animation runs is dropped. Resetting the zoom (camera change)
//! bumps a generation counter that stops any animation in flight. Each
//! animation step checks the generation and publishes under the same lock
//! as the reset, so a stale step never lands after a reset.

use crate::capabilities::CapabilitySet;
use crate::config::ZoomConfig;
use crate::observable::Observable;
use crate::platform::CaptureBackend;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;

pub const DEFAULT_ZOOM_RATIO: f32 = 1.0;

pub struct ZoomController {
    backend: Arc<dyn CaptureBackend>,
    settings: ZoomConfig,
    ratio: Observable<f32>,
    lock: Arc<AsyncMutex<()>>,
    generation: Arc<Mutex<u64>>,
}

fn lock_generation(generation: &Mutex<u64>) -> MutexGuard<'_, u64> {
    generation.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ZoomController {
    pub fn new(backend: Arc<dyn CaptureBackend>, settings: ZoomConfig) -> Self {
        Self {
            backend,
            settings,
            ratio: Observable::new(DEFAULT_ZOOM_RATIO),
            lock: Arc::new(AsyncMutex::new(())),
            generation: Arc::new(Mutex::new(0)),
        }
    }

    pub fn ratio(&self) -> f32 {
        self.ratio.get()
    }

    pub fn subscribe(&self) -> watch::Receiver<f32> {
        self.ratio.subscribe()
    }

    pub fn is_animating(&self) -> bool {
        self.lock.try_lock().is_err()
    }

    /// Clamp into the device range and apply immediately
    pub fn set_ratio(&self, capabilities: &CapabilitySet, ratio: f32) -> f32 {
        let clamped = capabilities.clamp_zoom_ratio(ratio);
        let _generation = lock_generation(&self.generation);
        apply(&self.ratio, self.backend.as_ref(), clamped);
        clamped
    }

    /// Back to 1x, cancelling any animation
    pub fn reset(&self, capabilities: &CapabilitySet) {
        let mut generation = lock_generation(&self.generation);
        *generation += 1;
        let ratio = capabilities.clamp_zoom_ratio(DEFAULT_ZOOM_RATIO);
        apply(&self.ratio, self.backend.as_ref(), ratio);
    }

    /// Animate towards `target`.
    ///
    /// Returns `None` when an animation already holds the zoom lock or no
    /// tokio runtime is available.
    pub fn smooth_zoom(
        &self,
        capabilities: &CapabilitySet,
        target: f32,
    ) -> Option<JoinHandle<()>> {
        let Ok(guard) = Arc::clone(&self.lock).try_lock_owned() else {
            log::debug!("Smooth zoom already running, dropping request for {:.2}x", target);
            return None;
        };
        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                log::warn!("Smooth zoom needs a tokio runtime: {}", e);
                return None;
            }
        };

        let target = capabilities.clamp_zoom_ratio(target);
        let steps = interpolate(self.ratio.get(), target, self.settings.smooth_zoom_steps);
        let step_delay = Duration::from_millis(self.settings.smooth_zoom_step_ms);
        let generation = Arc::clone(&self.generation);
        let started_at = *lock_generation(&generation);
        let ratio = self.ratio.clone();
        let backend = Arc::clone(&self.backend);

        Some(runtime.spawn(async move {
            let _guard = guard;
            for step in steps {
                tokio::time::sleep(step_delay).await;
                let current = lock_generation(&generation);
                if *current != started_at {
                    log::debug!("Smooth zoom interrupted by a zoom reset");
                    return;
                }
                apply(&ratio, backend.as_ref(), step);
            }
        }))
    }
}

fn apply(ratio: &Observable<f32>, backend: &dyn CaptureBackend, value: f32) {
    if ratio.set_if_changed(value) {
        backend.set_zoom_ratio(value);
    }
}

/// Evenly spaced ratios from `from` (exclusive) to `to` (inclusive)
pub fn interpolate(from: f32, to: f32, steps: u32) -> Vec<f32> {
    let steps = steps.max(1);
    (1..=steps)
        .map(|i| {
            if i == steps {
                to
            } else {
                from + (to - from) * i as f32 / steps as f32
            }
        })
        .collect()
}
