use std::fmt::Write;

use chrono::{DateTime, Utc};

use super::DeviceState;

pub const HEADER: &str = "ups state:";

/// Render the `/status` reply: a header, then one line per device such as
/// `nut/furnace: OL CHRG, 6431s, 6s ago`.
pub fn render(snapshot: &[(String, DeviceState)], now: DateTime<Utc>) -> String {
    let mut out = String::from(HEADER);
    for (topic, state) in snapshot {
        let age = (now - state.last_seen).num_seconds().max(0);
        let runtime = state
            .runtime_remaining
            .map(|secs| secs.to_string())
            .unwrap_or_default();
        // Writing into a String cannot fail.
        let _ = write!(
            out,
            "\n{topic}: {}, {runtime}s, {age}s ago",
            state.full_status
        );
    }
    out
}
