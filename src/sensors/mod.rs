//! Attribute state management.
//!
//! This module turns raw reported values into canonical, throttled sensor
//! state and defines the interface to the entity host that displays it.

pub mod host;
pub mod metadata;
pub mod tracker;
pub mod value;

pub use host::{EntityHost, LoggingHost};
pub use metadata::AttributeDescriptor;
pub use tracker::{AttributeState, AttributeTracker, Observation};
pub use value::{AttributeValue, normalize};
