//! Appliance performance score
//!
//! Scores are only requested for security appliances, but the reported
//! family covers every device in the inventory; the score is an optional
//! overlay on the device fields.

use super::{async_trait, Family, FamilyCollector};
use crate::api::models::PerformanceScoreBody;
use crate::api::{operations, DashboardApi};
use crate::error::{ApiError, CollectError};
use crate::event::{detail_fields, device_fields, MetricEvent};
use crate::inventory::{Device, DeviceIndex, Serial};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::HashMap;
use tracing::debug;

/// Score recorded when the API has no score for the device (204 No Content)
pub const NO_SCORE_SENTINEL: f64 = -1.0;

/// Performance score of one appliance along with the status that produced it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DevicePerformanceScore {
    pub performance_score: f64,
    pub http_status_code: u16,
}

impl DevicePerformanceScore {
    /// Score intentionally withheld by the API
    pub fn unavailable(http_status_code: u16) -> Self {
        Self {
            performance_score: NO_SCORE_SENTINEL,
            http_status_code,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        self.http_status_code == crate::api::STATUS_NO_CONTENT
    }
}

/// Devices eligible for a score lookup
pub fn prune_to_appliances(devices: &DeviceIndex) -> Vec<&Device> {
    devices.filter(Device::is_appliance)
}

/// Fetch and interpret the performance score of one appliance
pub async fn get_device_performance_score(
    api: &DashboardApi,
    serial: &str,
) -> Result<DevicePerformanceScore, ApiError> {
    let response = api.device_appliance_performance(serial).await?;

    if response.is_no_content() {
        return Ok(DevicePerformanceScore::unavailable(response.status));
    }

    if !response.is_success() {
        return Err(ApiError::UnexpectedStatus {
            operation: operations::DEVICE_APPLIANCE_PERFORMANCE,
            status: response.status,
            body: response.body,
        });
    }

    let body: PerformanceScoreBody =
        DashboardApi::decode(operations::DEVICE_APPLIANCE_PERFORMANCE, &response.body)?;

    Ok(DevicePerformanceScore {
        performance_score: body.perf_score,
        http_status_code: response.status,
    })
}

/// Scores for every appliance in the inventory
///
/// Up to `concurrency` lookups run at once. The first failing lookup aborts
/// the whole family; a malformed body is treated the same as a transport
/// failure.
pub async fn get_device_performance_scores(
    api: &DashboardApi,
    devices: &DeviceIndex,
    concurrency: usize,
) -> Result<HashMap<Serial, DevicePerformanceScore>, ApiError> {
    let serials: Vec<Serial> = prune_to_appliances(devices)
        .into_iter()
        .map(|device| device.serial.clone())
        .collect();
    debug!(appliances = serials.len(), "Fetching performance scores");

    stream::iter(serials)
        .map(|serial| async move {
            let score = get_device_performance_score(api, serial.as_str()).await?;
            Ok::<_, ApiError>((serial, score))
        })
        .buffer_unordered(concurrency.max(1))
        .try_collect()
        .await
}

/// One event per inventory device with the score overlaid where known
pub fn performance_score_events(
    devices: &DeviceIndex,
    scores: &HashMap<Serial, DevicePerformanceScore>,
) -> Vec<MetricEvent> {
    devices
        .iter()
        .map(|device| {
            let mut metric = device_fields("device.appliance", device);
            metric.extend(detail_fields("device.appliance.details", device));

            if let Some(score) = scores.get(&device.serial) {
                if score.is_unavailable() {
                    metric.set(
                        "device.appliance.performance.http_status_code",
                        score.http_status_code,
                    );
                } else {
                    metric.set("device.appliance.performance.score", score.performance_score);
                }
            }

            metric
        })
        .collect()
}

/// Collects performance scores for an organization's appliances
pub struct PerformanceScoreCollector {
    api: DashboardApi,
    concurrency: usize,
}

impl PerformanceScoreCollector {
    pub fn new(api: DashboardApi, concurrency: usize) -> Self {
        Self { api, concurrency }
    }
}

#[async_trait]
impl FamilyCollector for PerformanceScoreCollector {
    fn family(&self) -> Family {
        Family::PerformanceScore
    }

    async fn collect(
        &self,
        _organization_id: &str,
        devices: &DeviceIndex,
    ) -> Result<Vec<MetricEvent>, CollectError> {
        let scores = get_device_performance_scores(&self.api, devices, self.concurrency)
            .await
            .map_err(|e| CollectError::family(Family::PerformanceScore, e))?;

        Ok(performance_score_events(devices, &scores))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::{DeviceDetail, RawDevice};
    use serde_json::json;

    fn device(serial: &str, model: &str) -> RawDevice {
        RawDevice {
            serial: serial.to_string(),
            model: Some(model.to_string()),
            ..Default::default()
        }
    }

    fn find<'a>(events: &'a [MetricEvent], serial: &str) -> &'a MetricEvent {
        events
            .iter()
            .find(|e| e.get("device.appliance.serial") == Some(&json!(serial)))
            .unwrap()
    }

    #[test]
    fn test_prune_keeps_only_mx_models() {
        let index = DeviceIndex::build(vec![
            device("Q2HP-0001", "MX68"),
            device("Q2AB-0002", "MR34"),
            device("Q2CD-0003", "MS120-8"),
        ]);

        let pruned = prune_to_appliances(&index);
        assert_eq!(pruned.len(), 1);
        assert_eq!(pruned[0].serial.as_str(), "Q2HP-0001");
    }

    #[test]
    fn test_events_cover_full_inventory() {
        let index = DeviceIndex::build(vec![
            device("Q2HP-0001", "MX68"),
            device("Q2HP-0002", "MX84"),
            device("Q2AB-0003", "MR34"),
        ]);
        let mut scores = HashMap::new();
        scores.insert(
            Serial::from("Q2HP-0001"),
            DevicePerformanceScore {
                performance_score: 42.0,
                http_status_code: 200,
            },
        );
        scores.insert(Serial::from("Q2HP-0002"), DevicePerformanceScore::unavailable(204));

        let events = performance_score_events(&index, &scores);
        assert_eq!(events.len(), 3);

        let scored = find(&events, "Q2HP-0001");
        assert_eq!(scored.get("device.appliance.performance.score"), Some(&json!(42.0)));
        assert!(!scored.contains_key("device.appliance.performance.http_status_code"));

        let unavailable = find(&events, "Q2HP-0002");
        assert_eq!(
            unavailable.get("device.appliance.performance.http_status_code"),
            Some(&json!(204))
        );
        assert!(!unavailable.contains_key("device.appliance.performance.score"));

        let radio = find(&events, "Q2AB-0003");
        assert!(!radio.contains_key("device.appliance.performance.score"));
        assert!(!radio.contains_key("device.appliance.performance.http_status_code"));
        assert_eq!(radio.get("device.appliance.model"), Some(&json!("MR34")));
    }

    #[test]
    fn test_details_are_flattened() {
        let mut raw = device("Q2HP-0001", "MX68");
        raw.details = vec![
            DeviceDetail {
                name: "port_count".to_string(),
                value: json!(10),
            },
            DeviceDetail {
                name: "cellular".to_string(),
                value: json!(false),
            },
        ];
        let index = DeviceIndex::build(vec![raw]);

        let events = performance_score_events(&index, &HashMap::new());
        assert_eq!(
            events[0].get("device.appliance.details.port_count"),
            Some(&json!(10))
        );
        assert_eq!(
            events[0].get("device.appliance.details.cellular"),
            Some(&json!(false))
        );
    }

    #[test]
    fn test_unavailable_score_uses_sentinel() {
        let score = DevicePerformanceScore::unavailable(204);
        assert_eq!(score.performance_score, NO_SCORE_SENTINEL);
        assert!(score.is_unavailable());
    }
}
