//! Wireless channel utilization per radio
//!
//! Only networks carrying the `wireless` product type are queried. Some
//! networks reject the endpoint because of their firmware tier; those
//! failures are recognised from the response body and skipped.

use super::{async_trait, Family, FamilyCollector};
use crate::api::models::{BandUtilization, ChannelUtilizationRecord, Network};
use crate::api::{operations, DashboardApi};
use crate::error::{ApiError, CollectError};
use crate::event::{device_fields, MetricEvent};
use crate::inventory::DeviceIndex;
use crate::observability::AgentMetrics;
use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, info};

/// Product type marking networks with access points
pub const WIRELESS_PRODUCT_TYPE: &str = "wireless";

/// A failure body known to mean "endpoint unsupported here"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnsupportedSignature {
    /// Substring looked for in the error body
    pub marker: &'static str,
    pub description: &'static str,
}

/// Failures that skip a network instead of aborting the family
pub const UNSUPPORTED_SIGNATURES: &[UnsupportedSignature] = &[UnsupportedSignature {
    marker: "MR 27.0",
    description: "channel utilization is only available for networks on MR 27.0 or above",
}];

/// Find the known signature matching a failure body, if any
pub fn match_unsupported(body: &str) -> Option<&'static UnsupportedSignature> {
    UNSUPPORTED_SIGNATURES
        .iter()
        .find(|signature| body.contains(signature.marker))
}

/// Channel utilization returned for one network
#[derive(Debug, Clone)]
pub struct ChannelUtilizationBatch {
    pub network_id: String,
    pub records: Vec<ChannelUtilizationRecord>,
}

/// Fetch one network; `None` when the network does not support the endpoint
async fn get_network_channel_utilization(
    api: &DashboardApi,
    network_id: &str,
) -> Result<Option<ChannelUtilizationBatch>, ApiError> {
    let response = api.network_channel_utilization(network_id).await?;

    if response.is_success() {
        let records = api.channel_utilization_pages(network_id, response).await?;
        return Ok(Some(ChannelUtilizationBatch {
            network_id: network_id.to_string(),
            records,
        }));
    }

    if let Some(signature) = match_unsupported(&response.body) {
        info!(
            event = "network_skipped",
            network_id = %network_id,
            status = response.status,
            reason = signature.description,
            "Skipping channel utilization for network"
        );
        AgentMetrics::new().inc_networks_skipped();
        return Ok(None);
    }

    Err(ApiError::UnexpectedStatus {
        operation: operations::NETWORK_CHANNEL_UTILIZATION,
        status: response.status,
        body: response.body,
    })
}

/// Channel utilization for every wireless network
///
/// Up to `concurrency` networks are fetched at once; batches keep the order
/// of `networks`. Any failure not listed in `UNSUPPORTED_SIGNATURES` aborts
/// the whole family.
pub async fn get_network_health_channel_utilization(
    api: &DashboardApi,
    networks: &[Network],
    concurrency: usize,
) -> Result<Vec<ChannelUtilizationBatch>, ApiError> {
    let wireless: Vec<String> = networks
        .iter()
        .filter(|network| network.has_product_type(WIRELESS_PRODUCT_TYPE))
        .map(|network| network.id.clone())
        .collect();
    debug!(
        networks = networks.len(),
        wireless = wireless.len(),
        "Fetching channel utilization"
    );

    let batches: Vec<Option<ChannelUtilizationBatch>> = stream::iter(wireless)
        .map(|network_id| async move { get_network_channel_utilization(api, &network_id).await })
        .buffered(concurrency.max(1))
        .try_collect()
        .await?;

    Ok(batches.into_iter().flatten().collect())
}

/// Band fields from the band's last sample; empty bands add nothing
fn band_fields(metric: &mut MetricEvent, band: &str, samples: &[BandUtilization]) {
    let Some(sample) = samples.last() else {
        return;
    };
    let key = |field: &str| format!("network.health.channel.radio.{}.{}", band, field);

    metric.set(key("start_time"), sample.start_time);
    metric.set(key("end_time"), sample.end_time);
    metric.set(key("utilization80211"), sample.utilization80211);
    metric.set(key("utilizationNon80211"), sample.utilization_non80211);
    metric.set(key("utilizationTotal"), sample.utilization_total);
}

/// One event per radio present in the inventory.
///
/// Radios whose serial is not in the inventory are dropped, so every event
/// carries the `device.*` fields of a known device.
pub fn channel_utilization_events(
    devices: &DeviceIndex,
    batches: &[ChannelUtilizationBatch],
) -> Vec<MetricEvent> {
    let mut metrics = Vec::new();

    for batch in batches {
        for radio in &batch.records {
            let Some(device) = devices.get(&radio.serial) else {
                debug!(
                    serial = %radio.serial,
                    network_id = %batch.network_id,
                    "Skipping channel utilization for unknown radio"
                );
                continue;
            };

            let mut metric = MetricEvent::new()
                .with("network.health.channel.radio.serial", &radio.serial)
                .with("network.health.channel.radio.model", &radio.model)
                .with("network.health.channel.radio.tags", &radio.tags);

            band_fields(&mut metric, "wifi0", &radio.wifi0);
            band_fields(&mut metric, "wifi1", &radio.wifi1);

            metric.extend(device_fields("device", device));
            metrics.push(metric);
        }
    }

    metrics
}

/// Collects channel utilization for an organization's wireless networks
pub struct ChannelUtilizationCollector {
    api: DashboardApi,
    concurrency: usize,
}

impl ChannelUtilizationCollector {
    pub fn new(api: DashboardApi, concurrency: usize) -> Self {
        Self { api, concurrency }
    }
}

#[async_trait]
impl FamilyCollector for ChannelUtilizationCollector {
    fn family(&self) -> Family {
        Family::ChannelUtilization
    }

    async fn collect(
        &self,
        organization_id: &str,
        devices: &DeviceIndex,
    ) -> Result<Vec<MetricEvent>, CollectError> {
        let networks = self
            .api
            .organization_networks(organization_id)
            .await
            .map_err(|e| CollectError::family(Family::ChannelUtilization, e))?;

        let batches = get_network_health_channel_utilization(&self.api, &networks, self.concurrency)
            .await
            .map_err(|e| CollectError::family(Family::ChannelUtilization, e))?;

        Ok(channel_utilization_events(devices, &batches))
    }
}
