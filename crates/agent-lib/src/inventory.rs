//! Device inventory index
//!
//! Built once per collection cycle from the organization device list and
//! shared read-only by every family collector as the serial join table.

use crate::api::models::RawDevice;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

/// Serial number of a physical device, the join key across families
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Serial(String);

impl Serial {
    pub fn new(serial: impl Into<String>) -> Self {
        Self(serial.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Serial {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Serial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Serial {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Geographic position of a device
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
}

/// Static inventory attributes of a device for the current cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub serial: Serial,
    pub network_id: String,
    pub model: String,
    pub firmware: String,
    pub address: String,
    pub location: Option<Location>,
    pub mac: String,
    pub imei: Option<String>,
    pub lan_ip: Option<String>,
    pub name: String,
    pub notes: String,
    pub product_type: String,
    pub tags: BTreeSet<String>,
    /// Model-specific extra attributes
    pub details: BTreeMap<String, serde_json::Value>,
}

impl Device {
    /// Whether the model belongs to the security appliance family
    pub fn is_appliance(&self) -> bool {
        self.model.starts_with(APPLIANCE_MODEL_PREFIX)
    }
}

/// Model prefix of the security appliance family
pub const APPLIANCE_MODEL_PREFIX: &str = "MX";

impl From<RawDevice> for Device {
    fn from(raw: RawDevice) -> Self {
        let location = match (raw.lat, raw.lng) {
            (Some(lat), Some(lon)) => Some(Location { lat, lon }),
            _ => None,
        };

        Self {
            serial: Serial(raw.serial),
            network_id: raw.network_id.unwrap_or_default(),
            model: raw.model.unwrap_or_default(),
            firmware: raw.firmware.unwrap_or_default(),
            address: raw.address.unwrap_or_default(),
            location,
            mac: raw.mac.unwrap_or_default(),
            imei: raw.imei,
            lan_ip: raw.lan_ip,
            name: raw.name.unwrap_or_default(),
            notes: raw.notes.unwrap_or_default(),
            product_type: raw.product_type.unwrap_or_default(),
            tags: raw.tags.into_iter().collect(),
            details: raw
                .details
                .into_iter()
                .map(|detail| (detail.name, detail.value))
                .collect(),
        }
    }
}

/// Serial → device mapping for one collection cycle
#[derive(Debug, Clone, Default)]
pub struct DeviceIndex {
    devices: HashMap<Serial, Device>,
}

impl DeviceIndex {
    /// Build the index from the raw inventory; a repeated serial keeps the last entry
    pub fn build(raw: Vec<RawDevice>) -> Self {
        raw.into_iter().map(Device::from).collect()
    }

    /// Look up a device by serial
    pub fn get(&self, serial: &str) -> Option<&Device> {
        self.devices.get(serial)
    }

    pub fn contains(&self, serial: &str) -> bool {
        self.devices.contains_key(serial)
    }

    /// Iterate all devices, in no particular order
    pub fn iter(&self) -> impl Iterator<Item = &Device> {
        self.devices.values()
    }

    /// Devices matching a predicate
    pub fn filter<P>(&self, predicate: P) -> Vec<&Device>
    where
        P: Fn(&Device) -> bool,
    {
        self.devices.values().filter(|d| predicate(d)).collect()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

impl FromIterator<Device> for DeviceIndex {
    fn from_iter<I: IntoIterator<Item = Device>>(iter: I) -> Self {
        Self {
            devices: iter
                .into_iter()
                .map(|device| (device.serial.clone(), device))
                .collect(),
        }
    }
}
