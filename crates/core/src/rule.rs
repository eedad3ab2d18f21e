use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::step::{ActionStep, ordered_steps};
use crate::types::RuleId;

/// Wildcard accepted in scope lists.
pub const SCOPE_WILDCARD: &str = "*";

/// A declarative remediation policy: trigger, conditions, ordered steps,
/// scope and throttling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemediationRule {
    /// Unique identifier. Assigned by the engine when left empty.
    #[serde(default)]
    pub id: RuleId,
    /// Unique human-readable name.
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Advisory ordering for operator review; higher first.
    #[serde(default)]
    pub priority: i32,
    pub trigger: Trigger,
    /// Predicates that must all pass.
    #[serde(default)]
    pub conditions: Vec<RuleCondition>,
    /// Ordered action steps. The first one is the action's headline.
    pub actions: Vec<ActionStep>,
    #[serde(default)]
    pub scope: RuleScope,
    /// Minimum seconds between triggers. Falls back to the engine default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooldown_seconds: Option<u64>,
    /// Stored but not enforced; zero means unlimited.
    #[serde(default)]
    pub max_executions: u32,
    #[serde(default)]
    pub require_approval: bool,
    /// Log steps instead of executing them.
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub last_triggered: Option<DateTime<Utc>>,
    #[serde(default)]
    pub execution_count: u64,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn default_enabled() -> bool {
    true
}

impl RemediationRule {
    /// Create an enabled rule with no steps, conditions or scope.
    #[must_use]
    pub fn new(name: impl Into<String>, trigger: Trigger) -> Self {
        let now = Utc::now();
        Self {
            id: RuleId::default(),
            name: name.into(),
            description: String::new(),
            enabled: true,
            priority: 0,
            trigger,
            conditions: Vec::new(),
            actions: Vec::new(),
            scope: RuleScope::default(),
            cooldown_seconds: None,
            max_executions: 0,
            require_approval: false,
            dry_run: false,
            last_triggered: None,
            execution_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<RuleId>) -> Self {
        self.id = id.into();
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn with_condition(mut self, condition: RuleCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    #[must_use]
    pub fn with_step(mut self, step: ActionStep) -> Self {
        self.actions.push(step);
        self
    }

    #[must_use]
    pub fn with_scope(mut self, scope: RuleScope) -> Self {
        self.scope = scope;
        self
    }

    #[must_use]
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown_seconds = Some(cooldown.as_secs());
        self
    }

    #[must_use]
    pub fn with_approval(mut self, require_approval: bool) -> Self {
        self.require_approval = require_approval;
        self
    }

    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// The rule's own cooldown, if set.
    pub fn cooldown(&self) -> Option<Duration> {
        self.cooldown_seconds.map(Duration::from_secs)
    }

    /// The step that labels actions built from this rule.
    pub fn headline_step(&self) -> Option<&ActionStep> {
        ordered_steps(&self.actions).into_iter().next()
    }

    /// Check the rule's trigger, conditions and typed step parameters.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if self.actions.is_empty() {
            return Err(ValidationError::NoActions(self.name.clone()));
        }
        self.trigger.validate()?;
        for condition in &self.conditions {
            condition.validate()?;
        }
        for (index, step) in self.actions.iter().enumerate() {
            step.validate(index)?;
        }
        Ok(())
    }
}

/// Kind of signal a rule reacts to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    #[default]
    Event,
    Metric,
    Schedule,
}

/// A filter value: one exact string, or a list of allowed strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    One(String),
    Any(Vec<String>),
}

impl FilterValue {
    pub fn matches(&self, actual: &str) -> bool {
        match self {
            Self::One(expected) => expected == actual,
            Self::Any(allowed) => allowed.iter().any(|a| a == actual),
        }
    }
}

impl From<&str> for FilterValue {
    fn from(s: &str) -> Self {
        Self::One(s.to_owned())
    }
}

impl From<Vec<&str>> for FilterValue {
    fn from(values: Vec<&str>) -> Self {
        Self::Any(values.into_iter().map(str::to_owned).collect())
    }
}

/// Threshold query for metric triggers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricTrigger {
    pub query: String,
    pub threshold: f64,
    /// How long the threshold must be exceeded, in seconds.
    #[serde(default)]
    pub duration_seconds: u64,
}

/// What a rule reacts to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    #[serde(rename = "type", default)]
    pub trigger_type: TriggerType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Event types this rule reacts to; empty means any.
    #[serde(default)]
    pub event_types: Vec<String>,
    #[serde(default)]
    pub filters: BTreeMap<String, FilterValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric: Option<MetricTrigger>,
    /// Cron expression for schedule triggers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
}

impl Trigger {
    /// An event trigger restricted to the given event types.
    #[must_use]
    pub fn event<I, S>(event_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            trigger_type: TriggerType::Event,
            event_types: event_types.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn metric(query: impl Into<String>, threshold: f64, duration: Duration) -> Self {
        Self {
            trigger_type: TriggerType::Metric,
            metric: Some(MetricTrigger {
                query: query.into(),
                threshold,
                duration_seconds: duration.as_secs(),
            }),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn schedule(cron: impl Into<String>) -> Self {
        Self {
            trigger_type: TriggerType::Schedule,
            schedule: Some(cron.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_filter(mut self, field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.filters.insert(field.into(), value.into());
        self
    }

    /// Parse the cron expression of a schedule trigger.
    pub fn cron(&self) -> Result<croner::Cron, ValidationError> {
        let expr = self
            .schedule
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or(ValidationError::MissingSchedule)?;
        croner::Cron::new(expr)
            .parse()
            .map_err(|e| ValidationError::InvalidSchedule {
                expr: expr.to_owned(),
                reason: e.to_string(),
            })
    }

    fn validate(&self) -> Result<(), ValidationError> {
        match self.trigger_type {
            TriggerType::Event => Ok(()),
            TriggerType::Metric => match &self.metric {
                Some(m) if !m.query.trim().is_empty() => Ok(()),
                _ => Err(ValidationError::MissingMetricQuery),
            },
            TriggerType::Schedule => self.cron().map(|_| ()),
        }
    }
}

/// Where a condition reads its actual value from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionType {
    /// Entry of the event's data map.
    ResourceStatus,
    /// Entry of the event's labels.
    Label,
    /// Time-of-day gate. Always passes for now.
    TimeWindow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Eq,
    Neq,
    Contains,
    Regex,
    /// Comma-separated allow-list.
    In,
}

/// A single predicate evaluated against an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleCondition {
    #[serde(rename = "type")]
    pub condition_type: ConditionType,
    #[serde(default)]
    pub field: String,
    pub operator: ConditionOperator,
    #[serde(default)]
    pub value: String,
}

impl RuleCondition {
    pub fn new(
        condition_type: ConditionType,
        field: impl Into<String>,
        operator: ConditionOperator,
        value: impl Into<String>,
    ) -> Self {
        Self {
            condition_type,
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.condition_type == ConditionType::TimeWindow {
            return Ok(());
        }
        if self.operator == ConditionOperator::Regex {
            regex::Regex::new(&self.value).map_err(|e| ValidationError::InvalidRegex {
                field: self.field.clone(),
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }
}

/// Allow-lists restricting where a rule applies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleScope {
    #[serde(default)]
    pub clusters: Vec<String>,
    #[serde(default)]
    pub namespaces: Vec<String>,
}

impl RuleScope {
    #[must_use]
    pub fn clusters<I, S>(clusters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            clusters: clusters.into_iter().map(Into::into).collect(),
            namespaces: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_namespaces<I, S>(mut self, namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.namespaces = namespaces.into_iter().map(Into::into).collect();
        self
    }

    /// Whether the scope admits the given cluster and namespace.
    pub fn allows(&self, cluster: &str, namespace: &str) -> bool {
        allow_list_permits(&self.clusters, cluster) && allow_list_permits(&self.namespaces, namespace)
    }

    /// Explicit cluster ids, ignoring wildcards.
    pub fn explicit_clusters(&self) -> impl Iterator<Item = &str> {
        self.clusters
            .iter()
            .map(String::as_str)
            .filter(|c| *c != SCOPE_WILDCARD)
    }
}

fn allow_list_permits(list: &[String], value: &str) -> bool {
    list.is_empty() || list.iter().any(|entry| entry == SCOPE_WILDCARD || entry == value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::StepKind;

    fn restart_rule() -> RemediationRule {
        RemediationRule::new("restart", Trigger::event(["Warning"]))
            .with_step(ActionStep::new(StepKind::RestartPod {
                grace_period_seconds: None,
            }))
    }

    #[test]
    fn scope_wildcard_and_empty_allow_everything() {
        assert!(RuleScope::default().allows("anything", "ns"));
        assert!(RuleScope::clusters(["*"]).allows("prod", "default"));
        let scoped = RuleScope::clusters(["prod", "staging"]).with_namespaces(["default"]);
        assert!(scoped.allows("prod", "default"));
        assert!(!scoped.allows("dev", "default"));
        assert!(!scoped.allows("prod", "kube-system"));
    }

    #[test]
    fn filter_value_single_and_list() {
        let json = serde_json::json!({"reason": "BackOff", "severity": ["high", "critical"]});
        let filters: BTreeMap<String, FilterValue> = serde_json::from_value(json).unwrap();
        assert!(filters["reason"].matches("BackOff"));
        assert!(!filters["reason"].matches("Evicted"));
        assert!(filters["severity"].matches("critical"));
        assert!(!filters["severity"].matches("low"));
    }

    #[test]
    fn valid_rule_passes() {
        assert!(restart_rule().validate().is_ok());
    }

    #[test]
    fn rule_without_steps_is_invalid() {
        let rule = RemediationRule::new("empty", Trigger::event(["Warning"]));
        assert_eq!(
            rule.validate(),
            Err(ValidationError::NoActions("empty".into()))
        );
    }

    #[test]
    fn blank_name_is_invalid() {
        let mut rule = restart_rule();
        rule.name = "  ".into();
        assert_eq!(rule.validate(), Err(ValidationError::EmptyName));
    }

    #[test]
    fn bad_regex_is_invalid() {
        let rule = restart_rule().with_condition(RuleCondition::new(
            ConditionType::ResourceStatus,
            "reason",
            ConditionOperator::Regex,
            "(unclosed",
        ));
        assert!(matches!(
            rule.validate(),
            Err(ValidationError::InvalidRegex { .. })
        ));
    }

    #[test]
    fn any_time_window_value_is_accepted() {
        let rule = restart_rule().with_condition(RuleCondition::new(
            ConditionType::TimeWindow,
            "",
            ConditionOperator::Regex,
            "business-hours (",
        ));
        assert!(rule.validate().is_ok());
    }

    #[test]
    fn schedule_trigger_requires_valid_cron() {
        let mut rule = restart_rule();
        rule.trigger = Trigger::schedule("not a cron");
        assert!(matches!(
            rule.validate(),
            Err(ValidationError::InvalidSchedule { .. })
        ));

        rule.trigger = Trigger::schedule("*/5 * * * *");
        assert!(rule.validate().is_ok());

        rule.trigger.schedule = None;
        assert_eq!(rule.validate(), Err(ValidationError::MissingSchedule));
    }

    #[test]
    fn metric_trigger_requires_query() {
        let mut rule = restart_rule();
        rule.trigger = Trigger::metric("", 0.9, Duration::from_secs(60));
        assert_eq!(rule.validate(), Err(ValidationError::MissingMetricQuery));
    }

    #[test]
    fn headline_is_lowest_order_step() {
        let rule = RemediationRule::new("multi", Trigger::event(Vec::<String>::new()))
            .with_step(ActionStep::new(StepKind::Cordon).with_order(5))
            .with_step(
                ActionStep::new(StepKind::Notify {
                    channel: None,
                    message: None,
                })
                .with_order(1),
            );
        assert_eq!(
            rule.headline_step().map(ActionStep::action_type),
            Some(crate::step::ActionType::Notify)
        );
    }

    #[test]
    fn rule_deserializes_with_defaults() {
        let json = serde_json::json!({
            "name": "evicted",
            "trigger": {"type": "event", "filters": {"reason": "Evicted"}},
            "actions": [{"type": "delete", "grace_period_seconds": 0}],
            "cooldown_seconds": 60
        });
        let rule: RemediationRule = serde_json::from_value(json).unwrap();
        assert!(rule.enabled);
        assert!(rule.id.is_empty());
        assert_eq!(rule.cooldown(), Some(Duration::from_secs(60)));
        assert_eq!(rule.execution_count, 0);
        assert!(rule.validate().is_ok());
    }
}
