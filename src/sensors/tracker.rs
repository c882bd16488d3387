//! Per-attribute throttled state.
//!
//! A tracker holds the value the host currently sees plus at most one
//! withheld newer value. A differing observation is applied right away when
//! the throttle interval has elapsed since the last apply, otherwise it
//! replaces the pending value and waits for [`AttributeTracker::flush`].

use super::value::normalize;
use super::{AttributeDescriptor, AttributeValue};
use chrono::{DateTime, Utc};
use log::debug;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

/// What an observation did to the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// First value for this attribute, applied.
    Created,
    /// Value changed and was applied immediately.
    Applied,
    /// Value changed but the interval has not elapsed; held as pending.
    Deferred,
    /// Same as the applied value; nothing changed.
    Unchanged,
}

/// Point-in-time copy of a tracker's state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributeState {
    pub name: String,
    pub applied: Option<AttributeValue>,
    pub pending: Option<AttributeValue>,
    pub last_applied_at: Option<DateTime<Utc>>,
    pub unit: Option<&'static str>,
}

pub struct AttributeTracker {
    /// Name as first reported by the device
    name: String,
    applied: Option<AttributeValue>,
    pending: Option<AttributeValue>,
    last_applied_at: Option<DateTime<Utc>>,
    throttle: Duration,
    unit: Option<&'static str>,
}

impl AttributeTracker {
    /// Create an uninitialized tracker. The first [`observe`](Self::observe)
    /// applies unconditionally.
    pub fn new(name: impl Into<String>, throttle: Duration) -> Self {
        Self {
            name: name.into(),
            applied: None,
            pending: None,
            last_applied_at: None,
            throttle,
            unit: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn applied(&self) -> Option<&AttributeValue> {
        self.applied.as_ref()
    }

    pub fn pending(&self) -> Option<&AttributeValue> {
        self.pending.as_ref()
    }

    pub fn last_applied_at(&self) -> Option<DateTime<Utc>> {
        self.last_applied_at
    }

    /// Record a newly reported raw value.
    pub fn observe(&mut self, raw: &Value, now: DateTime<Utc>) -> Observation {
        let (value, unit) = normalize(&self.name, raw);

        if self.applied.is_none() {
            self.unit = unit;
            self.apply(value, now);
            return Observation::Created;
        }

        // Compared against the applied value only; an existing pending value is left alone
        if self.applied.as_ref() == Some(&value) {
            return Observation::Unchanged;
        }

        if self.interval_elapsed(now) {
            self.apply(value, now);
            debug!("Attribute {} updated immediately", self.name);
            Observation::Applied
        } else {
            debug!("Attribute {}: value changed, waiting for interval", self.name);
            self.pending = Some(value);
            Observation::Deferred
        }
    }

    /// Apply the pending value if the interval has elapsed.
    ///
    /// Returns the newly applied value, if any.
    pub fn flush(&mut self, now: DateTime<Utc>) -> Option<AttributeValue> {
        if self.pending.is_none() || !self.interval_elapsed(now) {
            return None;
        }

        let value = self.pending.take()?;
        self.apply(value.clone(), now);
        debug!("Attribute {} updated with pending value", self.name);
        Some(value)
    }

    pub fn descriptor(&self, address: &str) -> AttributeDescriptor {
        AttributeDescriptor::new(address, &self.name, self.applied.clone())
    }

    pub fn state(&self) -> AttributeState {
        AttributeState {
            name: self.name.clone(),
            applied: self.applied.clone(),
            pending: self.pending.clone(),
            last_applied_at: self.last_applied_at,
            unit: self.unit,
        }
    }

    fn apply(&mut self, value: AttributeValue, now: DateTime<Utc>) {
        self.applied = Some(value);
        self.pending = None;
        self.last_applied_at = Some(now);
    }

    fn interval_elapsed(&self, now: DateTime<Utc>) -> bool {
        match self.last_applied_at {
            None => true,
            // A clock that went backwards counts as elapsed
            Some(last) => (now - last).to_std().map_or(true, |e| e >= self.throttle),
        }
    }
}
