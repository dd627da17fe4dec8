use super::UpdateOutcome;

/// Text to send for an update, if it is worth telling anyone about:
/// a device seen for the first time, or a change of basic status.
pub fn decide(outcome: UpdateOutcome, topic: &str, basic_status: &str) -> Option<String> {
    (outcome.is_new_device || outcome.changed).then(|| format!("{topic}: {basic_status}"))
}
