//! Metric family collection from the dashboard API
//!
//! Each family collector fetches one kind of telemetry, joins it with the
//! cycle's device inventory by serial and flattens the result into metric
//! events. The cycle drives the collectors for one organization and the
//! loop repeats cycles on an interval.

mod channel_utilization;
mod cycle;
mod r#loop;
mod performance;
mod uplink;


pub use channel_utilization::{
    channel_utilization_events, get_network_health_channel_utilization, match_unsupported,
    ChannelUtilizationBatch, ChannelUtilizationCollector, UnsupportedSignature,
    UNSUPPORTED_SIGNATURES,
};
pub use cycle::{CycleSummary, FamilyOutcome, Pipeline};
pub use performance::{
    get_device_performance_scores, get_device_performance_score, performance_score_events,
    prune_to_appliances, DevicePerformanceScore, PerformanceScoreCollector, NO_SCORE_SENTINEL,
};
pub use r#loop::{CollectionConfig, CollectionLoop, CollectionLoopBuilder, CollectionResults};
pub use uplink::{uplink_events, UplinkCollector};

use crate::error::CollectError;
use crate::event::MetricEvent;
use crate::health::components;
use crate::inventory::DeviceIndex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use async_trait::async_trait;

/// Metric families produced by the agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Family {
    /// Appliance uplink and HA status
    Uplinks,
    /// Appliance performance score
    #[serde(rename = "performance")]
    PerformanceScore,
    /// Wireless channel utilization
    ChannelUtilization,
}

impl Family {
    /// All families in collection order
    pub const ALL: [Family; 3] = [
        Family::Uplinks,
        Family::PerformanceScore,
        Family::ChannelUtilization,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Family::Uplinks => "uplinks",
            Family::PerformanceScore => "performance",
            Family::ChannelUtilization => "channel_utilization",
        }
    }

    /// Health registry component tracking this family
    pub fn component(&self) -> &'static str {
        match self {
            Family::Uplinks => components::UPLINKS,
            Family::PerformanceScore => components::PERFORMANCE,
            Family::ChannelUtilization => components::CHANNEL_UTILIZATION,
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Family {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "uplinks" | "uplink" => Ok(Family::Uplinks),
            "performance" | "performance_score" => Ok(Family::PerformanceScore),
            "channel_utilization" | "channel-utilization" => Ok(Family::ChannelUtilization),
            other => Err(format!("unknown metric family: {}", other)),
        }
    }
}

/// Trait for metric family collectors
#[async_trait]
pub trait FamilyCollector: Send + Sync {
    /// Family produced by this collector
    fn family(&self) -> Family;

    /// Fetch the family for an organization and flatten it against the inventory
    async fn collect(
        &self,
        organization_id: &str,
        devices: &DeviceIndex,
    ) -> Result<Vec<MetricEvent>, CollectError>;
}
