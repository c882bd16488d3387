//! UDP input source for devices that push JSON telemetry datagrams.
//!
//! Unknown senders become devices on first contact; every JSON key they
//! report becomes a throttled attribute.

mod dispatcher;
mod integration;
mod listener;
mod sweeper;

pub use dispatcher::{Dispatcher, RAW_DATA_ATTRIBUTE, parse_payload};
pub use integration::UdpIntegration;
pub use listener::{DatagramHandler, Packet, UdpListener};
pub use sweeper::spawn_sweeper;
