//! Device registry.
//!
//! Owns every device seen by one listener instance, keyed by source address.
//! Devices that show up before an entity host is registered are queued and
//! announced in arrival order once [`DeviceRegistry::register_host`] is called.
//!
//! A host callback that panics is contained: the registry logs it and keeps
//! its own state consistent. A device whose discovery panicked stays
//! unannounced and is announced again, with all its attributes, on its next
//! packet.

use super::{Device, DeviceSnapshot};
use crate::sensors::EntityHost;
use chrono::{DateTime, Utc};
use log::{debug, error, info};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

struct RegistryState {
    devices: HashMap<String, Device>,
    /// Addresses waiting for a host, in arrival order
    pending: Vec<String>,
    host: Option<Arc<dyn EntityHost>>,
}

pub struct DeviceRegistry {
    throttle: Duration,
    state: Mutex<RegistryState>,
}

/// Run one host callback. Returns `false` if it panicked.
fn call_host(callback: &str, address: &str, f: impl FnOnce()) -> bool {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(()) => true,
        Err(_) => {
            error!("[Registry] Host panicked in {} for {}", callback, address);
            false
        }
    }
}

/// Announce a device and mark it announced only if the host accepted it.
fn discover(host: &dyn EntityHost, device: &mut Device) {
    let address = device.address().to_string();
    let descriptors = device.descriptors();
    if call_host("on_device_discovered", &address, || {
        host.on_device_discovered(&address, &descriptors)
    }) {
        device.mark_announced();
    }
}

impl DeviceRegistry {
    pub fn new(throttle: Duration) -> Self {
        Self {
            throttle,
            state: Mutex::new(RegistryState {
                devices: HashMap::new(),
                pending: Vec::new(),
                host: None,
            }),
        }
    }

    /// Feed a parsed payload from `address`.
    ///
    /// Returns `true` if this created the device.
    pub fn observe(&self, address: &str, payload: &Map<String, Value>, now: DateTime<Utc>) -> bool {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let host = state.host.clone();

        let created = !state.devices.contains_key(address);
        let device = state
            .devices
            .entry(address.to_string())
            .or_insert_with(|| Device::new(address, self.throttle, now));

        let update = device.update(payload, now);

        if !device.is_announced() {
            // Unannounced devices report everything at discovery time
            match &host {
                Some(host) => {
                    info!("[Registry] New device detected: {}", address);
                    discover(host.as_ref(), device);
                }
                None => {
                    if !state.pending.iter().any(|a| a == address) {
                        info!("[Registry] Device {} queued until host is ready", address);
                        state.pending.push(address.to_string());
                    }
                }
            }
            return created;
        }

        if let Some(host) = &host {
            if !update.created.is_empty() {
                info!(
                    "[Registry] {} new attribute(s) for {}",
                    update.created.len(),
                    address
                );
                call_host("on_attributes_added", address, || {
                    host.on_attributes_added(address, &update.created)
                });
            }
            for name in &update.changed {
                if let Some(value) = device.tracker(name).and_then(|t| t.applied()) {
                    call_host("on_attribute_value_changed", address, || {
                        host.on_attribute_value_changed(address, name, value)
                    });
                }
            }
        }

        created
    }

    /// Register the entity host and announce every queued device, in order.
    pub fn register_host(&self, host: Arc<dyn EntityHost>) {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if state.host.is_some() {
            info!("[Registry] Replacing registered entity host");
        }
        state.host = Some(host.clone());

        let pending = std::mem::take(&mut state.pending);
        if !pending.is_empty() {
            info!("[Registry] Announcing {} queued device(s)", pending.len());
        }
        for address in pending {
            if let Some(device) = state.devices.get_mut(&address)
                && !device.is_announced()
            {
                discover(host.as_ref(), device);
            }
        }
    }

    pub fn is_host_ready(&self) -> bool {
        self.state.lock().host.is_some()
    }

    /// Apply every eligible pending value.
    ///
    /// A host callback that panics is logged and skipped; the sweep continues
    /// with the next tracker. Returns the number of values applied.
    pub fn flush_pending(&self, now: DateTime<Utc>) -> usize {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let host = state.host.clone();
        let mut applied = 0;

        for device in state.devices.values_mut() {
            let announce = device.is_announced();
            let address = device.address().to_string();

            for tracker in device.trackers_mut() {
                let Some(value) = tracker.flush(now) else {
                    continue;
                };
                applied += 1;

                let Some(host) = host.as_ref().filter(|_| announce) else {
                    continue;
                };
                let name = tracker.name();
                call_host("on_attribute_value_changed", &address, || {
                    host.on_attribute_value_changed(&address, name, &value)
                });
            }
        }

        if applied > 0 {
            debug!("[Registry] Applied {} pending value(s)", applied);
        }
        applied
    }

    pub fn device_count(&self) -> usize {
        self.state.lock().devices.len()
    }

    pub fn pending_device_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn device(&self, address: &str) -> Option<DeviceSnapshot> {
        self.state.lock().devices.get(address).map(Device::snapshot)
    }
}
