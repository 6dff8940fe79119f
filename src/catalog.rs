//! Device catalog
//!
//! Enumerates cameras from a [`CapabilitySource`] and splits them into two
//! lists. Internal cameras are fixed for the lifetime of the catalog and are
//! computed once; external cameras come and go and are recomputed on every
//! attach/detach notification. The combined list is published as an
//! observable value.

use crate::assert_invariant;
use crate::config::CameraPolicy;
use crate::device::{compare_ids, Device, PRIMARY_BACK_ID, PRIMARY_FRONT_ID};
use crate::errors::CameraError;
use crate::observable::Observable;
use crate::platform::{CapabilitySource, DeviceDescriptor, DeviceEvent};
use crate::types::Facing;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;

pub struct DeviceCatalog {
    source: Arc<dyn CapabilitySource>,
    policy: CameraPolicy,
    internal: Vec<Arc<Device>>,
    external: Mutex<Vec<Arc<Device>>>,
    devices: Observable<Vec<Arc<Device>>>,
}

impl DeviceCatalog {
    /// Enumerate devices and build the initial lists
    pub fn new(
        source: Arc<dyn CapabilitySource>,
        policy: CameraPolicy,
    ) -> Result<Self, CameraError> {
        let descriptors = source.enumerate()?;
        log::info!("Enumerated {} camera device(s)", descriptors.len());
        descriptors.iter().for_each(check_primary_facing);

        let mut internal = Vec::new();
        for descriptor in descriptors.iter().filter(|d| d.facing != Facing::External) {
            let is_primary = descriptor.id == PRIMARY_BACK_ID || descriptor.id == PRIMARY_FRONT_ID;
            if !is_primary && !policy.allows_auxiliary_camera(descriptor) {
                log::debug!("Auxiliary camera {} hidden by policy", descriptor.id);
                continue;
            }

            match source.capabilities(descriptor) {
                Ok(report) => internal.push(Arc::new(Device::new(descriptor, &report, &policy))),
                Err(e) if is_primary => return Err(e),
                Err(e) => log::warn!("Skipping auxiliary camera {}: {}", descriptor.id, e),
            }
        }
        internal.sort_by(|a, b| compare_ids(&a.id, &b.id));

        let external = build_external(source.as_ref(), &policy, &descriptors, &[]);
        let combined = combine(&internal, &external);

        Ok(Self {
            source,
            policy,
            internal,
            external: Mutex::new(external),
            devices: Observable::new(combined),
        })
    }

    /// Every usable device, internal ones first
    pub fn devices(&self) -> Vec<Arc<Device>> {
        self.devices.get()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<Arc<Device>>> {
        self.devices.subscribe()
    }

    pub fn internal_devices(&self) -> &[Arc<Device>] {
        &self.internal
    }

    pub fn external_devices(&self) -> Vec<Arc<Device>> {
        self.external
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn device(&self, id: &str) -> Option<Arc<Device>> {
        self.devices
            .with(|devices| devices.iter().find(|device| device.id == id).cloned())
    }

    pub fn policy(&self) -> &CameraPolicy {
        &self.policy
    }

    pub fn source(&self) -> &Arc<dyn CapabilitySource> {
        &self.source
    }

    /// Re-enumerate external cameras; returns whether the combined list changed
    pub fn refresh_external(&self) -> Result<bool, CameraError> {
        let descriptors = self.source.enumerate()?;

        let mut external = self.external.lock().unwrap_or_else(PoisonError::into_inner);
        let rebuilt = build_external(self.source.as_ref(), &self.policy, &descriptors, &external);
        *external = rebuilt;

        let combined = combine(&self.internal, &external);
        drop(external);

        let changed = self.devices.set_if_changed(combined);
        if changed {
            log::info!(
                "Camera list changed, {} device(s) available",
                self.devices.with(Vec::len)
            );
        }
        Ok(changed)
    }

    /// React to a hot-plug notification
    pub fn handle_event(&self, event: &DeviceEvent) -> Result<bool, CameraError> {
        match event {
            DeviceEvent::Connected(id) => log::info!("Camera connected: {}", id),
            DeviceEvent::Disconnected(id) => log::info!("Camera disconnected: {}", id),
        }
        self.refresh_external()
    }
}

/// Driver sanity check for the well-known primary ids
fn check_primary_facing(descriptor: &DeviceDescriptor) {
    if descriptor.id == PRIMARY_BACK_ID {
        assert_invariant!(
            descriptor.facing == Facing::Back,
            "Primary back camera must face back",
            "device catalog"
        );
    } else if descriptor.id == PRIMARY_FRONT_ID {
        assert_invariant!(
            descriptor.facing == Facing::Front,
            "Primary front camera must face front",
            "device catalog"
        );
    }
}

/// Build the external list, reusing devices already known by id
fn build_external(
    source: &dyn CapabilitySource,
    policy: &CameraPolicy,
    descriptors: &[DeviceDescriptor],
    previous: &[Arc<Device>],
) -> Vec<Arc<Device>> {
    let mut external: Vec<Arc<Device>> = descriptors
        .iter()
        .filter(|descriptor| descriptor.facing == Facing::External)
        .filter_map(|descriptor| {
            if let Some(known) = previous.iter().find(|device| device.id == descriptor.id) {
                return Some(Arc::clone(known));
            }
            match source.capabilities(descriptor) {
                Ok(report) => Some(Arc::new(Device::new(descriptor, &report, policy))),
                Err(e) => {
                    log::warn!("Skipping external camera {}: {}", descriptor.id, e);
                    None
                }
            }
        })
        .collect();
    external.sort_by(|a, b| compare_ids(&a.id, &b.id));
    external
}

/// Internal then external devices, first occurrence of an id wins
fn combine(internal: &[Arc<Device>], external: &[Arc<Device>]) -> Vec<Arc<Device>> {
    let mut seen = HashSet::new();
    internal
        .iter()
        .chain(external)
        .filter(|device| seen.insert(device.id.clone()))
        .cloned()
        .collect()
}
