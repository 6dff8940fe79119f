//! Device monitoring and hot-plug handling
//!
//! Drains the attach/detach stream of a [`CapabilitySource`] on a tokio task,
//! refreshes the [`DeviceCatalog`] for every event and forwards the event to
//! local subscribers.

use crate::catalog::DeviceCatalog;
use crate::errors::CameraError;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio::task::JoinHandle;

/// Device event types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    Connected(String),    // Device ID
    Disconnected(String), // Device ID
}

impl DeviceEvent {
    pub fn device_id(&self) -> &str {
        match self {
            DeviceEvent::Connected(id) | DeviceEvent::Disconnected(id) => id,
        }
    }
}

/// Keeps a catalog in sync with hot-plug notifications
pub struct DeviceMonitor {
    catalog: Arc<DeviceCatalog>,
    event_sender: mpsc::UnboundedSender<DeviceEvent>,
    event_receiver: AsyncMutex<mpsc::UnboundedReceiver<DeviceEvent>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl DeviceMonitor {
    pub fn new(catalog: Arc<DeviceCatalog>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        Self {
            catalog,
            event_sender: tx,
            event_receiver: AsyncMutex::new(rx),
            task: Mutex::new(None),
        }
    }

    /// Start monitoring for device changes; a no-op when already running
    pub fn start_monitoring(&self) -> Result<(), CameraError> {
        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return Ok(());
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            CameraError::InitializationError(format!(
                "Device monitoring needs a tokio runtime: {}",
                e
            ))
        })?;

        log::info!("Starting device monitoring");

        let mut hotplug = self.catalog.source().subscribe();
        let catalog = Arc::clone(&self.catalog);
        let event_sender = self.event_sender.clone();

        *task = Some(runtime.spawn(async move {
            while let Some(event) = hotplug.recv().await {
                match catalog.handle_event(&event) {
                    Ok(true) => {}
                    Ok(false) => log::debug!("{:?} left the camera list unchanged", event),
                    Err(e) => log::warn!("Failed to refresh cameras after {:?}: {}", event, e),
                }
                let _ = event_sender.send(event);
            }
            log::info!("Hot-plug stream closed, device monitoring finished");
        }));

        Ok(())
    }

    /// Stop monitoring for device changes
    pub fn stop_monitoring(&self) {
        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = task.take() {
            log::info!("Stopping device monitoring");
            handle.abort();
        }
    }

    pub fn is_monitoring(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Get next device event (non-blocking)
    pub async fn poll_event(&self) -> Option<DeviceEvent> {
        let mut rx = self.event_receiver.lock().await;
        rx.try_recv().ok()
    }

    /// Wait for next device event
    pub async fn wait_for_event(&self) -> Option<DeviceEvent> {
        let mut rx = self.event_receiver.lock().await;
        rx.recv().await
    }
}

impl Drop for DeviceMonitor {
    fn drop(&mut self) {
        self.stop_monitoring();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CameraPolicy;
    use crate::testing::SyntheticCapabilitySource;

    #[tokio::test]
    async fn test_attach_refreshes_catalog() {
        let source = Arc::new(SyntheticCapabilitySource::reference());
        let catalog =
            Arc::new(DeviceCatalog::new(source.clone(), CameraPolicy::default()).unwrap());
        let monitor = DeviceMonitor::new(Arc::clone(&catalog));
        monitor.start_monitoring().unwrap();
        assert!(monitor.is_monitoring());

        source.attach(SyntheticCapabilitySource::external_camera("usb-1"));
        let event = monitor.wait_for_event().await.unwrap();
        assert_eq!(event, DeviceEvent::Connected("usb-1".to_string()));
        assert!(catalog.device("usb-1").is_some());

        source.detach("usb-1");
        let event = monitor.wait_for_event().await.unwrap();
        assert_eq!(event.device_id(), "usb-1");
        assert!(catalog.device("usb-1").is_none());

        monitor.stop_monitoring();
        assert!(!monitor.is_monitoring());
        assert!(monitor.poll_event().await.is_none());
    }

    #[test]
    fn test_start_without_runtime_fails() {
        let source = Arc::new(SyntheticCapabilitySource::reference());
        let catalog = Arc::new(DeviceCatalog::new(source, CameraPolicy::default()).unwrap());
        let monitor = DeviceMonitor::new(catalog);
        assert!(monitor.start_monitoring().is_err());
    }
}
