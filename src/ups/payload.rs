use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::StatusUpdate;

const STATUS_KEY: &str = "ups.status";
const RUNTIME_KEY: &str = "battery.runtime";

// Fallback patterns for payloads that are not a complete JSON object.
static STATUS_FRAGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""ups\.status"\s*:\s*"([^"]*)""#).expect("status pattern is valid")
});
static RUNTIME_FRAGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""battery\.runtime"\s*:\s*([0-9]+)"#).expect("runtime pattern is valid")
});

/// Extract the status fields from a NUT bridge payload, e.g.
/// `{"battery.charge":100,"battery.runtime":6749,"ups.status":"OL CHRG"}`.
///
/// Returns `None` when the payload has no usable `ups.status`. The runtime is
/// only reported alongside a status, never on its own.
pub fn extract(payload: &str) -> Option<StatusUpdate> {
    match serde_json::from_str::<Value>(payload) {
        Ok(Value::Object(fields)) => {
            let full_status = fields.get(STATUS_KEY)?.as_str()?;
            let runtime_remaining = fields.get(RUNTIME_KEY).and_then(runtime_seconds);
            build(full_status, runtime_remaining)
        }
        _ => extract_fragments(payload),
    }
}

fn extract_fragments(payload: &str) -> Option<StatusUpdate> {
    let full_status = STATUS_FRAGMENT.captures(payload)?.get(1)?.as_str();
    let runtime_remaining = RUNTIME_FRAGMENT
        .captures(payload)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok());
    build(full_status, runtime_remaining)
}

fn build(full_status: &str, runtime_remaining: Option<u64>) -> Option<StatusUpdate> {
    let basic_status = full_status.split_whitespace().next()?;
    Some(StatusUpdate {
        basic_status: basic_status.to_string(),
        full_status: full_status.to_string(),
        runtime_remaining,
    })
}

/// Leading decimal digits of the runtime value: 6749 → 6749, 6749.5 → 6749,
/// "6749" → 6749. Negative or non-numeric values count as absent.
fn runtime_seconds(value: &Value) -> Option<u64> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return None,
    };
    let digits: String = text.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}
