//! Reporting devices and the per-instance registry that owns them.

pub mod registry;
pub mod udp_device;

pub use registry::DeviceRegistry;
pub use udp_device::{Device, DeviceSnapshot, DeviceUpdate};
