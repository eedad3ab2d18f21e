use std::collections::BTreeMap;

use remedy_core::{FilterValue, RemediationEvent, RemediationRule, Trigger};

/// Whether `rule` reacts to `event`: event types, trigger filters, then
/// scope. Cooldown and conditions are checked separately.
///
/// Metric and schedule rules go through the same checks, so a schedule rule
/// can also react to events on top of its cron firings.
pub fn matches(rule: &RemediationRule, event: &RemediationEvent) -> bool {
    rule.enabled
        && event_type_matches(&rule.trigger, event)
        && filters_match(&rule.trigger.filters, event)
        && rule.scope.allows(event.cluster_id.as_str(), &event.namespace)
}

/// An empty event-type set is unrestricted, whatever the trigger type.
fn event_type_matches(trigger: &Trigger, event: &RemediationEvent) -> bool {
    trigger.event_types.is_empty() || trigger.event_types.iter().any(|t| *t == event.event_type)
}

/// Every filter must match. A field the event lacks never matches.
fn filters_match(filters: &BTreeMap<String, FilterValue>, event: &RemediationEvent) -> bool {
    filters.iter().all(|(field, expected)| {
        event
            .field(field)
            .is_some_and(|actual| expected.matches(&actual))
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use remedy_core::RuleScope;

    use super::*;

    fn backoff_event() -> RemediationEvent {
        RemediationEvent::new("Warning", "prod")
            .with_resource("Pod", "default", "app-1")
            .with_reason("BackOff")
            .with_severity("warning")
    }

    fn crash_rule() -> RemediationRule {
        RemediationRule::new(
            "crash",
            Trigger::event(["Warning"]).with_filter("reason", vec!["BackOff", "CrashLoopBackOff"]),
        )
    }

    #[test]
    fn event_type_outside_set_never_matches() {
        let rule = crash_rule();
        let mut event = backoff_event();
        event.event_type = "Normal".into();
        assert!(!matches(&rule, &event));
        assert!(matches(&rule, &backoff_event()));
    }

    #[test]
    fn empty_event_type_set_is_unrestricted() {
        let rule = RemediationRule::new("any", Trigger::event(Vec::<String>::new()));
        let mut event = backoff_event();
        event.event_type = "Normal".into();
        assert!(matches(&rule, &event));
    }

    #[test]
    fn single_filter_is_exact() {
        let rule = RemediationRule::new(
            "oom",
            Trigger::event(["Warning"]).with_filter("reason", "OOMKilled"),
        );
        assert!(!matches(&rule, &backoff_event()));
        assert!(matches(&rule, &backoff_event().with_reason("OOMKilled")));
    }

    #[test]
    fn data_filters_compare_string_form() {
        let rule = RemediationRule::new(
            "restarts",
            Trigger::event(["Warning"]).with_filter("restart_count", "5"),
        );
        assert!(!matches(&rule, &backoff_event()));
        assert!(matches(&rule, &backoff_event().with_data("restart_count", 5)));
    }

    #[test]
    fn scope_restricts_cluster_and_namespace() {
        let rule = crash_rule().with_scope(RuleScope::clusters(["staging"]));
        assert!(!matches(&rule, &backoff_event()));

        let rule = crash_rule().with_scope(RuleScope::clusters(["*"]).with_namespaces(["default"]));
        assert!(matches(&rule, &backoff_event()));
        let mut other_ns = backoff_event();
        other_ns.namespace = "kube-system".into();
        assert!(!matches(&rule, &other_ns));
    }

    #[test]
    fn metric_rules_match_on_filters() {
        let rule = RemediationRule::new(
            "pvc",
            Trigger::metric("used / capacity", 0.85, Duration::from_secs(300))
                .with_filter("reason", "VolumeUsageHigh"),
        );
        assert!(!matches(&rule, &backoff_event()));
        assert!(matches(&rule, &backoff_event().with_reason("VolumeUsageHigh")));
    }

    #[test]
    fn schedule_rule_matches_through_filters_and_scope() {
        let scheduled = RemediationRule::new(
            "nightly",
            Trigger::schedule("0 3 * * *").with_filter("reason", "BackOff"),
        );
        assert!(matches(&scheduled, &backoff_event()));
        assert!(!matches(&scheduled, &backoff_event().with_reason("OOMKilled")));

        let staging_only = scheduled.with_scope(RuleScope::clusters(["staging"]));
        assert!(!matches(&staging_only, &backoff_event()));
    }

    #[test]
    fn event_types_restrict_every_trigger_type() {
        let mut scheduled = RemediationRule::new("nightly", Trigger::schedule("0 3 * * *"));
        scheduled.trigger.event_types = vec!["Normal".into()];
        assert!(!matches(&scheduled, &backoff_event()));
    }

    #[test]
    fn disabled_rules_never_match() {
        assert!(!matches(&crash_rule().disabled(), &backoff_event()));
    }
}
