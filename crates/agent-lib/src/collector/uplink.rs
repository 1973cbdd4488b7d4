//! Appliance uplink and high-availability status

use super::{async_trait, Family, FamilyCollector};
use crate::api::models::UplinkStatus;
use crate::api::DashboardApi;
use crate::error::CollectError;
use crate::event::{device_fields, MetricEvent};
use crate::inventory::DeviceIndex;
use tracing::debug;

/// Collects uplink status for every appliance in an organization
pub struct UplinkCollector {
    api: DashboardApi,
}

impl UplinkCollector {
    pub fn new(api: DashboardApi) -> Self {
        Self { api }
    }
}

#[async_trait]
impl FamilyCollector for UplinkCollector {
    fn family(&self) -> Family {
        Family::Uplinks
    }

    async fn collect(
        &self,
        organization_id: &str,
        devices: &DeviceIndex,
    ) -> Result<Vec<MetricEvent>, CollectError> {
        let statuses = self
            .api
            .organization_appliance_uplink_statuses(organization_id)
            .await
            .map_err(|e| CollectError::family(Family::Uplinks, e))?;

        Ok(uplink_events(devices, &statuses))
    }
}

/// One event per uplink interface of every appliance present in the inventory
pub fn uplink_events(devices: &DeviceIndex, statuses: &[UplinkStatus]) -> Vec<MetricEvent> {
    let mut metrics = Vec::new();

    for status in statuses {
        let Some(device) = devices.get(&status.serial) else {
            debug!(serial = %status.serial, "Skipping uplink status for unknown device");
            continue;
        };

        let mut base = MetricEvent::new()
            .with(
                "appliance.uplink.high_availablity.enabled",
                status.high_availability.enabled,
            )
            .with(
                "appliance.uplink.high_availablity.role",
                &status.high_availability.role,
            )
            .with("appliance.uplink.last_reported_at", status.last_reported_at);
        base.extend(device_fields("appliance", device));

        for uplink in &status.uplinks {
            let interface = MetricEvent::new()
                .with("appliance.uplink.interface", &uplink.interface)
                .with("appliance.uplink.status", &uplink.status)
                .with("appliance.uplink.ip", &uplink.ip)
                .with("appliance.uplink.gateway", &uplink.gateway)
                .with("appliance.uplink.public_ip", &uplink.public_ip)
                .with("appliance.uplink.primary_dns", &uplink.primary_dns)
                .with("appliance.uplink.secondary_dns", &uplink.secondary_dns)
                .with("appliance.uplink.ip_assigned_by", &uplink.ip_assigned_by);

            metrics.push(base.union(&interface));
        }
    }

    metrics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::{HighAvailability, RawDevice, UplinkInterface};
    use serde_json::json;

    fn index() -> DeviceIndex {
        DeviceIndex::build(vec![RawDevice {
            serial: "Q2HP-XXXX".to_string(),
            model: Some("MX68".to_string()),
            network_id: Some("N_1".to_string()),
            ..Default::default()
        }])
    }

    fn interface(name: &str, status: &str) -> UplinkInterface {
        UplinkInterface {
            interface: Some(name.to_string()),
            status: Some(status.to_string()),
            ..Default::default()
        }
    }

    fn status(serial: &str, uplinks: Vec<UplinkInterface>) -> UplinkStatus {
        UplinkStatus {
            serial: serial.to_string(),
            high_availability: HighAvailability {
                enabled: true,
                role: Some("primary".to_string()),
            },
            uplinks,
            ..Default::default()
        }
    }

    #[test]
    fn test_one_event_per_interface() {
        let statuses = vec![status(
            "Q2HP-XXXX",
            vec![interface("wan1", "active"), interface("wan2", "not connected")],
        )];

        let events = uplink_events(&index(), &statuses);

        assert_eq!(events.len(), 2);
        for event in &events {
            assert_eq!(event.get("appliance.serial"), Some(&json!("Q2HP-XXXX")));
            assert_eq!(event.get("appliance.network_id"), Some(&json!("N_1")));
            assert_eq!(
                event.get("appliance.uplink.high_availablity.role"),
                Some(&json!("primary"))
            );
        }
        assert_eq!(events[0].get("appliance.uplink.interface"), Some(&json!("wan1")));
        assert_eq!(events[0].get("appliance.uplink.status"), Some(&json!("active")));
        assert_eq!(events[1].get("appliance.uplink.interface"), Some(&json!("wan2")));
        assert_eq!(
            events[1].get("appliance.uplink.status"),
            Some(&json!("not connected"))
        );
    }

    #[test]
    fn test_unknown_serial_is_dropped() {
        let statuses = vec![
            status("Q2HP-XXXX", vec![interface("wan1", "active")]),
            status("Q2ZZ-UNKNOWN", vec![interface("wan1", "active")]),
        ];

        let events = uplink_events(&index(), &statuses);

        assert_eq!(events.len(), 1);
        assert!(events
            .iter()
            .all(|e| e.get("appliance.serial") != Some(&json!("Q2ZZ-UNKNOWN"))));
    }

    #[test]
    fn test_appliance_without_interfaces_emits_nothing() {
        let events = uplink_events(&index(), &[status("Q2HP-XXXX", vec![])]);
        assert!(events.is_empty());
    }
}
