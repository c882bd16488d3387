//! UDP telemetry bridge library.
//!
//! This library turns unsolicited UDP telemetry datagrams into a live,
//! rate-limited, per-attribute view of every reporting device, and notifies
//! an entity host of new devices, new attributes and value changes.

pub mod config;
pub mod device;
pub mod error;
pub mod input;
pub mod sensors;
