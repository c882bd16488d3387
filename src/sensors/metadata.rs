//! Static presentation metadata for well-known miner attributes.
//!
//! Looked up once when an attribute is first seen and handed to the entity
//! host inside an [`AttributeDescriptor`].

use super::AttributeValue;
use serde::Serialize;

const LABELS: &[(&str, &str)] = &[
    ("bestdiff", "Best Difficulty"),
    ("boardtype", "Board Type"),
    ("freeheap", "Free Heap"),
    ("hashrate", "Hashrate"),
    ("ip", "IP Address"),
    ("lastdiff", "Last Difficulty"),
    ("netdiff", "Network Difficulty"),
    ("pooldiff", "Pool Difficulty"),
    ("poolinuse", "Active Pool"),
    ("progress", "Progress"),
    ("rssi", "Signal Strength (RSSI)"),
    ("share", "Shares"),
    ("temp", "Temperature"),
    ("uptime", "Uptime"),
    ("valid", "Valid Shares"),
    ("version", "Version"),
];

const UNITS: &[(&str, &str)] = &[
    ("temp", "°C"),
    ("freeheap", "KB"),
    ("rssi", "dBm"),
    ("hashrate", super::value::HASHRATE_UNIT),
];

const ICONS: &[(&str, &str)] = &[
    ("hashrate", "mdi:chip"),
    ("temp", "mdi:thermometer"),
    ("freeheap", "mdi:memory"),
    ("rssi", "mdi:wifi"),
    ("uptime", "mdi:timer"),
    ("version", "mdi:information"),
    ("boardtype", "mdi:chip"),
    ("ip", "mdi:ip-network"),
    ("poolinuse", "mdi:server-network"),
    ("share", "mdi:chart-pie"),
    ("valid", "mdi:check-circle"),
    ("bestdiff", "mdi:chart-line"),
    ("lastdiff", "mdi:chart-line"),
    ("netdiff", "mdi:chart-line"),
    ("pooldiff", "mdi:chart-line"),
    ("progress", "mdi:progress-check"),
];

const DEVICE_CLASSES: &[(&str, &str)] = &[("temp", "temperature"), ("rssi", "signal_strength")];

fn lookup(table: &'static [(&'static str, &'static str)], key: &str) -> Option<&'static str> {
    table.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

/// Unit for a lower-cased attribute key.
pub fn unit_for(key: &str) -> Option<&'static str> {
    lookup(UNITS, key)
}

pub fn icon_for(key: &str) -> Option<&'static str> {
    lookup(ICONS, key)
}

pub fn device_class_for(key: &str) -> Option<&'static str> {
    lookup(DEVICE_CLASSES, key)
}

/// Display label, falling back to the name as reported.
pub fn label_for(name: &str) -> String {
    lookup(LABELS, &name.to_lowercase())
        .map(str::to_string)
        .unwrap_or_else(|| name.to_string())
}

/// Stable identifier for an attribute sensor, e.g. `udp_miner_10_0_0_5_temp`.
pub fn unique_id(address: &str, name: &str) -> String {
    format!("udp_miner_{}_{}", address.replace('.', "_"), name)
}

/// Everything the entity host needs to create a sensor for one attribute.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributeDescriptor {
    /// Attribute name as reported by the device
    pub name: String,
    pub label: String,
    pub unique_id: String,
    pub unit: Option<&'static str>,
    pub icon: Option<&'static str>,
    pub device_class: Option<&'static str>,
    /// Applied value at the time the descriptor was built
    pub value: Option<AttributeValue>,
}

impl AttributeDescriptor {
    pub fn new(address: &str, name: &str, value: Option<AttributeValue>) -> Self {
        let key = name.to_lowercase();
        Self {
            name: name.to_string(),
            label: label_for(name),
            unique_id: unique_id(address, name),
            unit: unit_for(&key),
            icon: icon_for(&key),
            device_class: device_class_for(&key),
            value,
        }
    }
}
