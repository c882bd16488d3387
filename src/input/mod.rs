//! Input sources for the telemetry bridge.
//!
//! Each input source type handles a specific protocol or data format and
//! feeds a device registry.
//!
//! Current input sources:
//! - `udp`: JSON telemetry datagrams pushed by devices such as miners

pub mod udp;

pub use udp::UdpIntegration;
