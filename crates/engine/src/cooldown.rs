use std::time::Duration;

use chrono::{DateTime, Utc};

use remedy_core::RemediationRule;

/// Whether enough time has passed since the rule last triggered.
///
/// A rule that never triggered is always eligible. The rule's own cooldown
/// wins over `default_cooldown`. The elapsed time must strictly exceed the
/// cooldown.
pub fn cooldown_elapsed(
    rule: &RemediationRule,
    now: DateTime<Utc>,
    default_cooldown: Duration,
) -> bool {
    let Some(last) = rule.last_triggered else {
        return true;
    };
    let cooldown = rule.cooldown().unwrap_or(default_cooldown);
    // A negative elapsed time (clock skew) counts as still cooling down.
    match (now - last).to_std() {
        Ok(elapsed) => elapsed > cooldown,
        Err(_) => false,
    }
}
