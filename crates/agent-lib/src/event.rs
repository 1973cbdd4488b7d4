//! Flattened metric events
//!
//! An event is a flat map from dotted-path keys (`appliance.uplink.status`)
//! to JSON values. Keys are kept ordered so identical inputs serialize to
//! identical bytes.

use crate::inventory::Device;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;

/// A single flattened metric event handed to the reporting sink
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricEvent(BTreeMap<String, Value>);

impl MetricEvent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, replacing any previous value. A value that cannot be
    /// represented as JSON is logged and the field is left out.
    pub fn set<V: Serialize>(&mut self, key: impl Into<String>, value: V) {
        let key = key.into();
        match serde_json::to_value(value) {
            Ok(value) => {
                self.0.insert(key, value);
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to serialize metric field");
            }
        }
    }

    /// Builder-style `set`
    pub fn with<V: Serialize>(mut self, key: impl Into<String>, value: V) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// A new event holding this event's fields overlaid with `other`'s
    pub fn union(&self, other: &MetricEvent) -> MetricEvent {
        let mut merged = self.clone();
        merged.extend(other.clone());
        merged
    }

    /// Move all fields of `other` into this event
    pub fn extend(&mut self, other: MetricEvent) {
        self.0.extend(other.0);
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Value)> for MetricEvent {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Static device attributes under `prefix`
pub fn device_fields(prefix: &str, device: &Device) -> MetricEvent {
    let key = |field: &str| format!("{}.{}", prefix, field);

    MetricEvent::new()
        .with(key("address"), &device.address)
        .with(key("firmware"), &device.firmware)
        .with(key("imei"), &device.imei)
        .with(key("lan_ip"), &device.lan_ip)
        .with(key("location"), device.location)
        .with(key("mac"), &device.mac)
        .with(key("model"), &device.model)
        .with(key("name"), &device.name)
        .with(key("network_id"), &device.network_id)
        .with(key("notes"), &device.notes)
        .with(key("product_type"), &device.product_type)
        .with(key("serial"), &device.serial)
        .with(key("tags"), &device.tags)
}

/// Model-specific device details, one field per detail under `prefix`
pub fn detail_fields(prefix: &str, device: &Device) -> MetricEvent {
    device
        .details
        .iter()
        .map(|(name, value)| (format!("{}.{}", prefix, name), value.clone()))
        .collect()
}
