//! A reporting device and its attribute trackers.

use crate::sensors::{AttributeDescriptor, AttributeState, AttributeTracker, Observation};
use chrono::{DateTime, Utc};
use log::debug;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::time::Duration;

pub const MANUFACTURER: &str = "Custom UDP devices";

/// Result of feeding one payload into a device.
#[derive(Debug, Default)]
pub struct DeviceUpdate {
    /// Attributes seen for the first time, in payload order
    pub created: Vec<AttributeDescriptor>,
    /// Attributes whose applied value changed, with the name as reported
    pub changed: Vec<String>,
}

/// Point-in-time copy of a device.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceSnapshot {
    pub address: String,
    pub name: String,
    pub announced: bool,
    pub last_seen: DateTime<Utc>,
    pub attributes: Vec<AttributeState>,
}

pub struct Device {
    address: String,
    throttle: Duration,
    /// Trackers in first-seen order
    trackers: Vec<AttributeTracker>,
    /// Lower-cased attribute name -> index into `trackers`
    index: HashMap<String, usize>,
    announced: bool,
    last_seen: DateTime<Utc>,
}

impl Device {
    pub fn new(address: impl Into<String>, throttle: Duration, now: DateTime<Utc>) -> Self {
        Self {
            address: address.into(),
            throttle,
            trackers: Vec::new(),
            index: HashMap::new(),
            announced: false,
            last_seen: now,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Display name, e.g. `Miner 10.0.0.5`.
    pub fn name(&self) -> String {
        format!("Miner {}", self.address)
    }

    pub fn manufacturer(&self) -> &'static str {
        MANUFACTURER
    }

    /// Whether the host has been told about this device.
    pub fn is_announced(&self) -> bool {
        self.announced
    }

    /// Record that the host accepted the discovery announcement.
    pub fn mark_announced(&mut self) {
        self.announced = true;
    }

    pub fn descriptors(&self) -> Vec<AttributeDescriptor> {
        self.trackers
            .iter()
            .map(|t| t.descriptor(&self.address))
            .collect()
    }

    pub fn tracker(&self, name: &str) -> Option<&AttributeTracker> {
        self.index
            .get(&name.to_lowercase())
            .map(|&i| &self.trackers[i])
    }

    pub fn trackers_mut(&mut self) -> impl Iterator<Item = &mut AttributeTracker> {
        self.trackers.iter_mut()
    }

    pub fn attribute_count(&self) -> usize {
        self.trackers.len()
    }

    /// Feed every attribute of a payload to its tracker, creating trackers
    /// for attributes not seen before.
    pub fn update(&mut self, payload: &Map<String, Value>, now: DateTime<Utc>) -> DeviceUpdate {
        let mut update = DeviceUpdate::default();
        self.last_seen = now;

        for (name, raw) in payload {
            let key = name.to_lowercase();
            let idx = match self.index.get(&key) {
                Some(&i) => i,
                None => {
                    self.trackers.push(AttributeTracker::new(name, self.throttle));
                    let i = self.trackers.len() - 1;
                    self.index.insert(key, i);
                    i
                }
            };

            let tracker = &mut self.trackers[idx];
            match tracker.observe(raw, now) {
                Observation::Created => {
                    debug!("New attribute {} for {}", name, self.address);
                    update.created.push(tracker.descriptor(&self.address));
                }
                Observation::Applied => update.changed.push(tracker.name().to_string()),
                Observation::Deferred | Observation::Unchanged => {}
            }
        }

        update
    }

    pub fn snapshot(&self) -> DeviceSnapshot {
        DeviceSnapshot {
            address: self.address.clone(),
            name: self.name(),
            announced: self.announced,
            last_seen: self.last_seen,
            attributes: self.trackers.iter().map(AttributeTracker::state).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::AttributeValue;
    use chrono::TimeZone;
    use serde_json::json;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn payload(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_update_creates_trackers_in_payload_order() {
        let mut device = Device::new("10.0.0.5", Duration::from_secs(5), at(0));
        let body: Value =
            serde_json::from_str(r#"{"temp": "40", "hashrate": "1 kH/s", "freeheap": "120 KB"}"#)
                .unwrap();
        let update = device.update(&payload(body), at(0));

        let names: Vec<_> = update.created.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["temp", "hashrate", "freeheap"]);
        let listed: Vec<_> = device.descriptors().into_iter().map(|d| d.name).collect();
        assert_eq!(listed, vec!["temp", "hashrate", "freeheap"]);
        assert!(update.changed.is_empty());
        assert_eq!(device.attribute_count(), 3);
        assert_eq!(device.name(), "Miner 10.0.0.5");
    }

    #[test]
    fn test_first_spelling_of_attribute_wins() {
        let mut device = Device::new("10.0.0.5", Duration::from_secs(5), at(0));
        let body: Value = serde_json::from_str(r#"{"temp": "40", "TEMP": "41"}"#).unwrap();
        let update = device.update(&payload(body), at(0));

        assert_eq!(update.created.len(), 1);
        assert_eq!(update.created[0].name, "temp");
        assert_eq!(device.attribute_count(), 1);
    }

    #[test]
    fn test_attribute_names_are_case_insensitive() {
        let mut device = Device::new("10.0.0.5", Duration::from_secs(5), at(0));
        device.update(&payload(json!({"Temp": "40"})), at(0));
        let update = device.update(&payload(json!({"TEMP": "41"})), at(10));

        assert!(update.created.is_empty());
        assert_eq!(update.changed, vec!["Temp".to_string()]);
        assert_eq!(device.attribute_count(), 1);
        assert_eq!(
            device.tracker("temp").and_then(|t| t.applied()),
            Some(&AttributeValue::Number(41.0))
        );
    }

    #[test]
    fn test_deferred_change_is_not_reported() {
        let mut device = Device::new("10.0.0.5", Duration::from_secs(5), at(0));
        device.update(&payload(json!({"temp": "40"})), at(0));
        let update = device.update(&payload(json!({"temp": "41", "rssi": "-60"})), at(1));

        assert!(update.changed.is_empty());
        assert_eq!(update.created.len(), 1);
        assert_eq!(update.created[0].name, "rssi");
    }

    #[test]
    fn test_announce_marks_device() {
        let mut device = Device::new("10.0.0.5", Duration::from_secs(5), at(0));
        device.update(&payload(json!({"temp": "40"})), at(0));
        assert!(!device.is_announced());

        device.mark_announced();
        assert!(device.is_announced());
        assert_eq!(device.descriptors().len(), 1);
        assert!(device.snapshot().announced);
    }
}
