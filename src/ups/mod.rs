pub mod notify;
pub mod payload;
pub mod report;
pub mod store;

use chrono::{DateTime, Utc};

/// Status fields pulled out of one bus payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    /// First token of `ups.status`, e.g. "OL" from "OL CHRG".
    pub basic_status: String,
    pub full_status: String,
    /// `battery.runtime` in seconds.
    pub runtime_remaining: Option<u64>,
}

/// Last known state of one UPS, keyed by its bus topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceState {
    pub basic_status: String,
    pub full_status: String,
    pub runtime_remaining: Option<u64>,
    pub last_seen: DateTime<Utc>,
}

/// What a store update did to the tracked device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub is_new_device: bool,
    pub changed: bool,
}
