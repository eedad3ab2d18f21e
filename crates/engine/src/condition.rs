use regex::Regex;

use remedy_core::{ConditionOperator, ConditionType, RemediationEvent, RuleCondition};

/// Whether every condition passes for `event`.
///
/// A field the event does not carry reads as the empty string.
pub fn evaluate(conditions: &[RuleCondition], event: &RemediationEvent) -> bool {
    conditions.iter().all(|c| passes(c, event))
}

fn passes(condition: &RuleCondition, event: &RemediationEvent) -> bool {
    match condition.condition_type {
        ConditionType::ResourceStatus => {
            let actual = event.data_str(&condition.field).unwrap_or_default();
            compare(condition.operator, &actual, &condition.value)
        }
        ConditionType::Label => {
            let actual = event.labels.get(&condition.field).map_or("", String::as_str);
            compare(condition.operator, actual, &condition.value)
        }
        // Placeholder: no window semantics are defined yet.
        ConditionType::TimeWindow => true,
    }
}

/// Apply `op` to an actual and expected value.
///
/// An invalid regex never matches. `in` splits `expected` on commas and trims
/// each entry.
pub fn compare(op: ConditionOperator, actual: &str, expected: &str) -> bool {
    match op {
        ConditionOperator::Eq => actual == expected,
        ConditionOperator::Neq => actual != expected,
        ConditionOperator::Contains => actual.contains(expected),
        ConditionOperator::Regex => Regex::new(expected).is_ok_and(|re| re.is_match(actual)),
        ConditionOperator::In => expected.split(',').any(|v| v.trim() == actual),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event() -> RemediationEvent {
        RemediationEvent::new("Warning", "prod")
            .with_label("tier", "backend")
            .with_data("phase", "CrashLoopBackOff")
            .with_data("restarts", 7)
    }

    #[test]
    fn operators() {
        assert!(compare(ConditionOperator::Eq, "a", "a"));
        assert!(!compare(ConditionOperator::Eq, "a", "b"));
        assert!(compare(ConditionOperator::Neq, "a", "b"));
        assert!(compare(ConditionOperator::Contains, "CrashLoopBackOff", "Loop"));
        assert!(compare(ConditionOperator::Regex, "web-7f9c", r"^web-\w+$"));
        assert!(!compare(ConditionOperator::Regex, "web", "(unclosed"));
        assert!(compare(ConditionOperator::In, "prod", "dev, staging ,prod"));
        assert!(!compare(ConditionOperator::In, "qa", "dev,staging,prod"));
    }

    #[test]
    fn resource_status_reads_data() {
        let phase = RuleCondition::new(
            ConditionType::ResourceStatus,
            "phase",
            ConditionOperator::Contains,
            "BackOff",
        );
        let restarts =
            RuleCondition::new(ConditionType::ResourceStatus, "restarts", ConditionOperator::Eq, "7");
        assert!(evaluate(&[phase, restarts], &event()));
    }

    #[test]
    fn missing_field_reads_empty() {
        let neq =
            RuleCondition::new(ConditionType::Label, "team", ConditionOperator::Neq, "payments");
        assert!(evaluate(&[neq], &event()));
        let eq = RuleCondition::new(ConditionType::ResourceStatus, "node", ConditionOperator::Eq, "");
        assert!(evaluate(&[eq], &event()));
        let contains = RuleCondition::new(
            ConditionType::ResourceStatus,
            "node",
            ConditionOperator::Contains,
            "worker",
        );
        assert!(!evaluate(&[contains], &event()));
    }

    #[test]
    fn label_condition() {
        let tier = RuleCondition::new(
            ConditionType::Label,
            "tier",
            ConditionOperator::In,
            "backend,worker",
        );
        assert!(evaluate(&[tier], &event()));
    }

    #[test]
    fn time_window_always_passes() {
        for value in ["22:00-06:00", "business-hours", ""] {
            let window =
                RuleCondition::new(ConditionType::TimeWindow, "", ConditionOperator::Eq, value);
            assert!(evaluate(&[window], &event()));
        }
    }

    #[test]
    fn empty_condition_list_passes() {
        assert!(evaluate(&[], &event()));
    }
}
