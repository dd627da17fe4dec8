use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::{DeviceState, StatusUpdate, UpdateOutcome};

/// Last known state per device topic. Entries are created on first sight and
/// live for the rest of the process.
#[derive(Debug, Default)]
pub struct DeviceStateStore {
    devices: BTreeMap<String, DeviceState>,
}

impl DeviceStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a status update for `topic`. Full status, runtime and last-seen
    /// are always refreshed; `changed` only reports the basic status.
    pub fn update(&mut self, topic: &str, update: StatusUpdate, now: DateTime<Utc>) -> UpdateOutcome {
        let StatusUpdate {
            basic_status,
            full_status,
            runtime_remaining,
        } = update;

        let Some(state) = self.devices.get_mut(topic) else {
            self.devices.insert(
                topic.to_string(),
                DeviceState {
                    basic_status,
                    full_status,
                    runtime_remaining,
                    last_seen: now,
                },
            );
            return UpdateOutcome {
                is_new_device: true,
                changed: true,
            };
        };

        let changed = state.basic_status != basic_status;
        if changed {
            state.basic_status = basic_status;
        }
        state.full_status = full_status;
        state.runtime_remaining = runtime_remaining;
        state.last_seen = now;

        UpdateOutcome {
            is_new_device: false,
            changed,
        }
    }

    pub fn get(&self, topic: &str) -> Option<&DeviceState> {
        self.devices.get(topic)
    }

    /// Owned copy of every device, ordered by topic.
    pub fn snapshot(&self) -> Vec<(String, DeviceState)> {
        self.devices
            .iter()
            .map(|(topic, state)| (topic.clone(), state.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
