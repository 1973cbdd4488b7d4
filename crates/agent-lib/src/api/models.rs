//! Wire models for dashboard API responses
//!
//! Only the fields the collectors read are modelled; anything else in the
//! payload is ignored so additive upstream changes do not break decoding.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Entry of the organization device list
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawDevice {
    pub serial: String,
    pub name: Option<String>,
    pub mac: Option<String>,
    pub network_id: Option<String>,
    pub model: Option<String>,
    pub firmware: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
    pub product_type: Option<String>,
    pub lan_ip: Option<String>,
    #[serde(deserialize_with = "string_or_number")]
    pub imei: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub tags: Vec<String>,
    pub details: Vec<DeviceDetail>,
}

/// Model-specific extra attribute of a device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceDetail {
    pub name: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

/// Entry of the organization network list
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Network {
    pub id: String,
    pub name: Option<String>,
    pub product_types: Vec<String>,
    pub tags: Vec<String>,
}

impl Network {
    pub fn has_product_type(&self, product_type: &str) -> bool {
        self.product_types.iter().any(|p| p == product_type)
    }
}

/// Uplink and high-availability status of one appliance
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UplinkStatus {
    pub serial: String,
    pub model: Option<String>,
    pub network_id: Option<String>,
    pub last_reported_at: Option<DateTime<Utc>>,
    pub high_availability: HighAvailability,
    pub uplinks: Vec<UplinkInterface>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HighAvailability {
    pub enabled: bool,
    pub role: Option<String>,
}

/// One WAN/cellular interface of an appliance
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UplinkInterface {
    pub interface: Option<String>,
    pub status: Option<String>,
    pub ip: Option<String>,
    pub gateway: Option<String>,
    pub public_ip: Option<String>,
    pub primary_dns: Option<String>,
    pub secondary_dns: Option<String>,
    pub ip_assigned_by: Option<String>,
}

/// Body of the device appliance performance endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceScoreBody {
    #[serde(rename = "perfScore")]
    pub perf_score: f64,
}

/// Per-radio entry of the network channel utilization endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChannelUtilizationRecord {
    pub serial: String,
    pub model: Option<String>,
    pub tags: Vec<String>,
    #[serde(deserialize_with = "null_as_empty")]
    pub wifi0: Vec<BandUtilization>,
    #[serde(deserialize_with = "null_as_empty")]
    pub wifi1: Vec<BandUtilization>,
}

/// Utilization sample for one radio band
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BandUtilization {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub utilization80211: f64,
    pub utilization_non80211: f64,
    pub utilization_total: f64,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
