//! Tests for the device catalog and hot-plug monitoring
//!
//! Uses the synthetic capability source, so no camera stack is needed.

use camera_session::config::CameraPolicy;
use camera_session::platform::{CapabilitySource, DeviceDescriptor, DeviceEvent, DeviceMonitor};
use camera_session::testing::{fixtures, SyntheticCapabilitySource};
use camera_session::types::Facing;
use camera_session::DeviceCatalog;
use std::sync::Arc;
use std::time::Duration;

fn ids(devices: &[Arc<camera_session::Device>]) -> Vec<String> {
    devices.iter().map(|device| device.id.clone()).collect()
}

fn shared(source: &Arc<SyntheticCapabilitySource>) -> Arc<dyn CapabilitySource> {
    Arc::clone(source) as Arc<dyn CapabilitySource>
}

#[cfg(test)]
mod enumeration_tests {
    use super::*;

    #[test]
    fn test_reference_devices_are_listed_in_id_order() {
        let catalog = DeviceCatalog::new(
            Arc::new(SyntheticCapabilitySource::reference()),
            fixtures::reference_policy(),
        )
        .expect("catalog");

        assert_eq!(ids(&catalog.devices()), vec!["0", "1", "2"]);
        assert!(catalog.external_devices().is_empty());

        let back = catalog.device("0").expect("primary back camera");
        assert_eq!(back.facing, Facing::Back);
        assert!(back.is_logical);
        assert!(back.is_primary());
        assert!(catalog.device("7").is_none());
    }

    #[test]
    fn test_policy_hides_auxiliary_cameras() {
        let disabled = CameraPolicy {
            enable_auxiliary_cameras: false,
            ..CameraPolicy::default()
        };
        let catalog = DeviceCatalog::new(Arc::new(SyntheticCapabilitySource::reference()), disabled)
            .expect("catalog");
        assert_eq!(ids(&catalog.devices()), vec!["0", "1"]);

        let ignored = CameraPolicy {
            ignored_auxiliary_camera_ids: vec!["2".to_string()],
            ..CameraPolicy::default()
        };
        let catalog = DeviceCatalog::new(Arc::new(SyntheticCapabilitySource::reference()), ignored)
            .expect("catalog");
        assert_eq!(ids(&catalog.devices()), vec!["0", "1"]);
    }

    #[test]
    fn test_logical_filter_never_hides_primary_cameras() {
        let policy = CameraPolicy {
            ignore_logical_auxiliary_cameras: true,
            ..CameraPolicy::default()
        };
        let mut devices = fixtures::reference_devices();
        devices.push((
            DeviceDescriptor::new("5", Facing::Back).with_physical_ids(&["6", "7"]),
            fixtures::ultra_wide_report(),
        ));

        let catalog =
            DeviceCatalog::new(Arc::new(SyntheticCapabilitySource::new(devices)), policy)
                .expect("catalog");
        assert_eq!(ids(&catalog.devices()), vec!["0", "1", "2"]);
    }

    #[test]
    fn test_numeric_ids_sort_numerically() {
        let mut devices = fixtures::reference_devices();
        devices.push((DeviceDescriptor::new("10", Facing::Back), fixtures::ultra_wide_report()));
        devices.push((DeviceDescriptor::new("3", Facing::Front), fixtures::front_report()));

        let catalog = DeviceCatalog::new(
            Arc::new(SyntheticCapabilitySource::new(devices)),
            CameraPolicy::default(),
        )
        .expect("catalog");
        assert_eq!(ids(&catalog.devices()), vec!["0", "1", "2", "3", "10"]);
    }

    #[test]
    #[should_panic(expected = "Primary back camera must face back")]
    fn test_misreported_primary_facing_is_fatal() {
        let devices = vec![(DeviceDescriptor::new("0", Facing::Front), fixtures::front_report())];
        let _ = DeviceCatalog::new(
            Arc::new(SyntheticCapabilitySource::new(devices)),
            CameraPolicy::default(),
        );
    }

    #[test]
    #[should_panic(expected = "Primary front camera must face front")]
    fn test_primary_front_id_reported_external_is_fatal() {
        let devices = vec![
            (DeviceDescriptor::new("0", Facing::Back), fixtures::back_report()),
            (DeviceDescriptor::new("1", Facing::External), fixtures::front_report()),
        ];
        let _ = DeviceCatalog::new(
            Arc::new(SyntheticCapabilitySource::new(devices)),
            CameraPolicy::default(),
        );
    }
}

#[cfg(test)]
mod hotplug_tests {
    use super::*;

    #[test]
    fn test_external_camera_attach_and_detach() {
        let source = Arc::new(SyntheticCapabilitySource::reference());
        let catalog = DeviceCatalog::new(shared(&source), CameraPolicy::default()).expect("catalog");
        let internal_before = catalog.internal_devices().to_vec();

        source.attach(SyntheticCapabilitySource::external_camera("usb-1"));
        assert!(catalog
            .handle_event(&DeviceEvent::Connected("usb-1".to_string()))
            .expect("refresh"));
        assert_eq!(ids(&catalog.devices()), vec!["0", "1", "2", "usb-1"]);
        assert!(catalog.device("usb-1").expect("external").is_external());

        // Internal devices are computed once and shared
        for (before, after) in internal_before.iter().zip(catalog.internal_devices()) {
            assert!(Arc::ptr_eq(before, after));
        }

        assert!(source.detach("usb-1"));
        assert!(catalog
            .handle_event(&DeviceEvent::Disconnected("usb-1".to_string()))
            .expect("refresh"));
        assert_eq!(ids(&catalog.devices()), vec!["0", "1", "2"]);
    }

    #[test]
    fn test_refresh_without_changes_does_not_publish() {
        let source = Arc::new(SyntheticCapabilitySource::reference());
        let catalog = DeviceCatalog::new(source, CameraPolicy::default()).expect("catalog");
        let mut devices = catalog.subscribe();
        devices.borrow_and_update();

        assert!(!catalog.refresh_external().expect("refresh"));
        assert!(!devices.has_changed().expect("catalog alive"));
    }

    #[tokio::test]
    async fn test_monitor_refreshes_catalog_and_forwards_events() {
        let source = Arc::new(SyntheticCapabilitySource::reference());
        let catalog = Arc::new(
            DeviceCatalog::new(shared(&source), CameraPolicy::default()).expect("catalog"),
        );
        let monitor = DeviceMonitor::new(Arc::clone(&catalog));
        monitor.start_monitoring().expect("monitor starts");
        assert!(monitor.is_monitoring());

        source.attach(SyntheticCapabilitySource::external_camera("usb-9"));
        let event = tokio::time::timeout(Duration::from_secs(1), monitor.wait_for_event())
            .await
            .expect("event in time");
        assert_eq!(event, Some(DeviceEvent::Connected("usb-9".to_string())));
        assert!(catalog.device("usb-9").is_some());

        monitor.stop_monitoring();
        assert!(monitor.poll_event().await.is_none());
    }

    #[test]
    fn test_monitor_requires_runtime() {
        let catalog = Arc::new(
            DeviceCatalog::new(
                Arc::new(SyntheticCapabilitySource::reference()),
                CameraPolicy::default(),
            )
            .expect("catalog"),
        );
        let monitor = DeviceMonitor::new(catalog);
        assert!(monitor.start_monitoring().is_err());
        assert!(!monitor.is_monitoring());
    }
}
