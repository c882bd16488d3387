//! Entity host interface.
//!
//! The entity host is whatever turns attributes into user-visible sensors.
//! The registry drives it through three callbacks: a device was discovered,
//! an already-announced device grew new attributes, and an attribute's
//! applied value changed.
//!
//! Callbacks are invoked while the registry lock is held, so implementations
//! must not call back into the registry.

use super::{AttributeDescriptor, AttributeValue};
use log::info;

/// Receiver of device and attribute notifications.
pub trait EntityHost: Send + Sync {
    /// A device was seen for the first time (or became announceable once the
    /// host registered). `attributes` carries every attribute known so far.
    fn on_device_discovered(&self, address: &str, attributes: &[AttributeDescriptor]);

    /// New attributes appeared on an already-announced device.
    fn on_attributes_added(&self, address: &str, attributes: &[AttributeDescriptor]);

    /// An attribute's applied value changed.
    fn on_attribute_value_changed(&self, address: &str, attribute: &str, value: &AttributeValue);
}

/// Host that only logs what it is told. Used by the service binary.
#[derive(Debug, Default)]
pub struct LoggingHost;

impl EntityHost for LoggingHost {
    fn on_device_discovered(&self, address: &str, attributes: &[AttributeDescriptor]) {
        info!(
            "[Host] Device {} discovered with {} attribute(s)",
            address,
            attributes.len()
        );
        for attr in attributes {
            log_descriptor(address, attr);
        }
    }

    fn on_attributes_added(&self, address: &str, attributes: &[AttributeDescriptor]) {
        info!(
            "[Host] {} new attribute(s) for {}",
            attributes.len(),
            address
        );
        for attr in attributes {
            log_descriptor(address, attr);
        }
    }

    fn on_attribute_value_changed(&self, address: &str, attribute: &str, value: &AttributeValue) {
        info!("[Host] {} {} = {}", address, attribute, value);
    }
}

fn log_descriptor(address: &str, attr: &AttributeDescriptor) {
    let value = attr
        .value
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_default();
    info!(
        "[Host]   {} {} ({}) = {} {}",
        address,
        attr.label,
        attr.unique_id,
        value,
        attr.unit.unwrap_or("")
    );
}
