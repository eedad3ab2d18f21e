use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use remedy_core::{ClusterId, RemediationEvent, RemediationRule};

use crate::condition;
use crate::engine::EngineInner;

/// Event type of the synthetic events built for schedule firings.
pub const SCHEDULE_EVENT_TYPE: &str = "Schedule";

/// Background loop firing schedule-triggered rules. Each tick fires the
/// rules whose cron expression had an occurrence since the previous tick.
pub(crate) async fn run(inner: Arc<EngineInner>) {
    let mut interval = tokio::time::interval(inner.config.schedule_tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    interval.tick().await;
    let mut last_check = Utc::now();

    loop {
        tokio::select! {
            () = inner.cancel.cancelled() => {
                info!("schedule loop stopping");
                break;
            }
            _ = interval.tick() => {
                let now = Utc::now();
                fire_due(&inner, last_check, now).await;
                last_check = now;
            }
        }
    }
}

/// Fire every schedule rule with an occurrence in `(since, now]`. Returns
/// the number of actions created.
pub(crate) async fn fire_due(inner: &EngineInner, since: DateTime<Utc>, now: DateTime<Utc>) -> usize {
    let mut created = 0;
    for rule in inner.rules.schedule_rules() {
        if !is_due(&rule, since, now) {
            continue;
        }
        created += fire(inner, &rule, now).await;
    }
    created
}

fn is_due(rule: &RemediationRule, since: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    let cron = match rule.trigger.cron() {
        Ok(cron) => cron,
        Err(e) => {
            warn!(rule = %rule.name, error = %e, "skipping schedule rule");
            return false;
        }
    };
    match cron.find_next_occurrence(&since, false) {
        Ok(next) => next <= now,
        Err(e) => {
            warn!(rule = %rule.name, error = %e, "cannot compute next occurrence");
            false
        }
    }
}

/// Submit one action per target cluster. The rule's cooldown is claimed
/// once for the whole firing and released if no action was submitted.
async fn fire(inner: &EngineInner, rule: &RemediationRule, now: DateTime<Utc>) -> usize {
    let clusters = target_clusters(inner, rule);
    if clusters.is_empty() {
        debug!(rule = %rule.name, "schedule due but no cluster to target");
        return 0;
    }
    let Some(claim) = inner
        .rules
        .try_claim(&rule.id, now, inner.config.default_cooldown)
    else {
        debug!(rule = %rule.name, "schedule due but rule cooling down");
        inner.metrics.increment_cooldown_skipped();
        return 0;
    };
    inner.metrics.increment_schedule_fired();
    info!(rule = %rule.name, clusters = clusters.len(), "schedule fired");

    let mut created = 0;
    for cluster in clusters {
        let event = RemediationEvent::new(SCHEDULE_EVENT_TYPE, cluster)
            .with_source("scheduler")
            .with_data("rule", rule.name.clone());
        if !condition::evaluate(&rule.conditions, &event) {
            debug!(rule = %rule.name, cluster = %event.cluster_id, "conditions not met");
            inner.metrics.increment_conditions_rejected();
            continue;
        }
        match inner.submit(rule, &event).await {
            Ok(_) => created += 1,
            Err(e) => warn!(rule = %rule.name, error = %e, "failed to submit scheduled action"),
        }
    }
    if created == 0 {
        debug!(rule = %rule.name, "nothing submitted, cooldown released");
        inner.rules.release(&rule.id, claim);
    }
    created
}

/// Clusters named explicitly in the rule's scope, or every registered
/// cluster when the scope is empty or a wildcard.
fn target_clusters(inner: &EngineInner, rule: &RemediationRule) -> Vec<ClusterId> {
    let explicit: Vec<ClusterId> = rule.scope.explicit_clusters().map(ClusterId::from).collect();
    if explicit.is_empty() {
        inner.clusters.ids()
    } else {
        explicit
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{TimeDelta, TimeZone};
    use remedy_cluster::RecordingClusterClient;
    use remedy_core::{
        ActionStatus, ActionStep, ConditionOperator, ConditionType, ResourceKind, RuleCondition,
        RuleId, RuleScope, StepKind, StepTarget, Trigger,
    };
    use remedy_store::{ActionQuery, RemediationStore};
    use remedy_store_memory::MemoryStore;

    use super::*;
    use crate::{EngineBuilder, EngineConfig};

    fn nightly(cron: &str) -> RemediationRule {
        RemediationRule::new("nightly-scale-down", Trigger::schedule(cron))
            .with_id("nightly")
            .with_step(
                ActionStep::new(StepKind::Scale { replicas: 0 }).with_target(StepTarget::Named {
                    kind: ResourceKind::Deployment,
                    name: "batch".into(),
                    namespace: Some("jobs".into()),
                }),
            )
    }

    #[test]
    fn due_only_when_occurrence_in_window() {
        let rule = nightly("0 3 * * *");
        let since = Utc.with_ymd_and_hms(2024, 5, 1, 2, 59, 30).unwrap();
        assert!(is_due(&rule, since, since + TimeDelta::seconds(45)));
        assert!(!is_due(&rule, since, since + TimeDelta::seconds(15)));

        let afternoon = Utc.with_ymd_and_hms(2024, 5, 1, 14, 0, 0).unwrap();
        assert!(!is_due(&rule, afternoon, afternoon + TimeDelta::seconds(30)));
    }

    #[tokio::test]
    async fn fires_once_per_cluster_and_claims_cooldown() {
        let store = Arc::new(MemoryStore::new());
        let config = EngineConfig {
            seed_builtin_rules: false,
            ..EngineConfig::default()
        };
        let engine = EngineBuilder::new()
            .store(Arc::clone(&store) as Arc<dyn RemediationStore>)
            .config(config)
            .cluster_client("prod", Arc::new(RecordingClusterClient::new()))
            .cluster_client("staging", Arc::new(RecordingClusterClient::new()))
            .build()
            .unwrap();
        engine.create_rule(nightly("* * * * *")).await.unwrap();

        let now = Utc::now();
        let since = now - TimeDelta::minutes(2);
        assert_eq!(fire_due(&engine.inner, since, now).await, 2);
        // Same window again: the default cooldown holds.
        assert_eq!(fire_due(&engine.inner, since, now).await, 0);

        let page = engine.list_actions(&ActionQuery::default()).await.unwrap();
        assert_eq!(page.total, 2);
        assert!(page.actions.iter().all(|a| a.status == ActionStatus::Queued));
        assert!(page.actions.iter().all(|a| a.trigger.event_type == SCHEDULE_EVENT_TYPE));
        assert_eq!(engine.metrics().schedule_fired, 1);
    }

    #[tokio::test]
    async fn explicit_scope_limits_clusters() {
        let engine = EngineBuilder::new()
            .store(Arc::new(MemoryStore::new()))
            .config(EngineConfig {
                seed_builtin_rules: false,
                ..EngineConfig::default()
            })
            .cluster_client("prod", Arc::new(RecordingClusterClient::new()))
            .cluster_client("staging", Arc::new(RecordingClusterClient::new()))
            .build()
            .unwrap();
        engine
            .create_rule(nightly("* * * * *").with_scope(RuleScope::clusters(["staging"])))
            .await
            .unwrap();

        let now = Utc::now();
        assert_eq!(fire_due(&engine.inner, now - TimeDelta::minutes(2), now).await, 1);
        let page = engine.list_actions(&ActionQuery::default()).await.unwrap();
        assert_eq!(page.actions[0].cluster_id.as_str(), "staging");
    }

    #[tokio::test]
    async fn cooldown_released_when_nothing_submitted() {
        let engine = EngineBuilder::new()
            .store(Arc::new(MemoryStore::new()))
            .config(EngineConfig {
                seed_builtin_rules: false,
                ..EngineConfig::default()
            })
            .cluster_client("prod", Arc::new(RecordingClusterClient::new()))
            .build()
            .unwrap();
        // Synthetic schedule events carry no labels, so this never passes.
        let gated = nightly("* * * * *").with_condition(RuleCondition::new(
            ConditionType::Label,
            "tier",
            ConditionOperator::Eq,
            "backend",
        ));
        engine.create_rule(gated).await.unwrap();

        let now = Utc::now();
        assert_eq!(fire_due(&engine.inner, now - TimeDelta::minutes(2), now).await, 0);
        let rule = engine.inner.rules.get(&RuleId::new("nightly")).unwrap();
        assert!(rule.last_triggered.is_none());
        assert_eq!(engine.metrics().cooldown_skipped, 0);
    }
}
