use std::time::Duration;

use remedy_core::{
    ActionId, ActionStatus, ActionStep, RemediationAction, RemediationEvent, RemediationRule,
    RuleId, StepKind, Trigger,
};

use crate::error::StoreError;
use crate::query::ActionQuery;
use crate::store::RemediationStore;

fn test_rule(id: &str, name: &str, priority: i32) -> RemediationRule {
    RemediationRule::new(name, Trigger::event(["Warning"]))
        .with_id(id)
        .with_priority(priority)
        .with_cooldown(Duration::from_secs(60))
        .with_step(ActionStep::new(StepKind::RestartPod {
            grace_period_seconds: None,
        }))
}

fn test_action(rule: &RemediationRule, cluster: &str, namespace: &str) -> RemediationAction {
    let event = RemediationEvent::new("Warning", cluster)
        .with_resource("Pod", namespace, "app-1")
        .with_reason("BackOff");
    let headline = rule.actions[0].clone();
    RemediationAction::new(rule, &headline, &event, false)
}

/// Run the full store conformance test suite.
///
/// Call this from your backend's test module with a fresh, empty store.
///
/// # Errors
///
/// Returns an error if the backend fails an operation.
pub async fn run_store_conformance_tests(store: &dyn RemediationStore) -> Result<(), StoreError> {
    test_rule_round_trip(store).await?;
    test_enabled_rules_only(store).await?;
    test_delete_rule(store).await?;
    test_list_rules_order(store).await?;
    test_action_round_trip(store).await?;
    test_query_actions(store).await?;
    Ok(())
}

async fn test_rule_round_trip(store: &dyn RemediationStore) -> Result<(), StoreError> {
    let rule = test_rule("conf-rt", "conf-round-trip", 0);
    store.save_rule(&rule).await?;
    let loaded = store.get_rule(&rule.id).await?;
    assert_eq!(loaded.as_ref().map(|r| &r.name), Some(&rule.name));
    assert_eq!(loaded.map(|r| r.actions), Some(rule.actions));

    let missing = store.get_rule(&RuleId::new("conf-missing")).await?;
    assert!(missing.is_none(), "get on missing rule should return None");
    Ok(())
}

async fn test_enabled_rules_only(store: &dyn RemediationStore) -> Result<(), StoreError> {
    let enabled = test_rule("conf-on", "conf-enabled", 0);
    let disabled = test_rule("conf-off", "conf-disabled", 0).disabled();
    store.save_rule(&enabled).await?;
    store.save_rule(&disabled).await?;

    let loaded = store.load_enabled_rules().await?;
    assert!(loaded.iter().any(|r| r.id == enabled.id));
    assert!(
        !loaded.iter().any(|r| r.id == disabled.id),
        "disabled rules must not be loaded"
    );
    Ok(())
}

async fn test_delete_rule(store: &dyn RemediationStore) -> Result<(), StoreError> {
    let rule = test_rule("conf-del", "conf-delete", 0);
    store.save_rule(&rule).await?;
    assert!(store.delete_rule(&rule.id).await?);
    assert!(store.get_rule(&rule.id).await?.is_none());
    assert!(
        !store.delete_rule(&rule.id).await?,
        "delete on missing rule should return false"
    );
    Ok(())
}

async fn test_list_rules_order(store: &dyn RemediationStore) -> Result<(), StoreError> {
    store.save_rule(&test_rule("conf-lo", "conf-low", -10)).await?;
    store.save_rule(&test_rule("conf-hi", "conf-high", 100)).await?;
    let rules = store.list_rules().await?;
    let hi = rules.iter().position(|r| r.name == "conf-high");
    let lo = rules.iter().position(|r| r.name == "conf-low");
    assert!(
        matches!((hi, lo), (Some(h), Some(l)) if h < l),
        "higher priority rules should be listed first"
    );
    Ok(())
}

async fn test_action_round_trip(store: &dyn RemediationStore) -> Result<(), StoreError> {
    let rule = test_rule("conf-act", "conf-action", 0);
    let mut action = test_action(&rule, "conf-cluster", "default");
    store.save_action(&action).await?;

    action.status = ActionStatus::Queued;
    store.save_action(&action).await?;

    let loaded = store.get_action(&action.id).await?;
    assert_eq!(loaded.map(|a| a.status), Some(ActionStatus::Queued));
    assert!(store.get_action(&ActionId::new("conf-none")).await?.is_none());
    Ok(())
}

async fn test_query_actions(store: &dyn RemediationStore) -> Result<(), StoreError> {
    let rule = test_rule("conf-query", "conf-query", 0);
    for i in 0..5 {
        let mut action = test_action(&rule, "conf-query-cluster", "default");
        action.created_at += chrono::Duration::seconds(i);
        if i % 2 == 0 {
            action.status = ActionStatus::Failed;
        }
        store.save_action(&action).await?;
    }

    let all = store
        .query_actions(&ActionQuery::default().for_rule("conf-query"))
        .await?;
    assert_eq!(all.total, 5);
    assert!(
        all.actions
            .windows(2)
            .all(|w| w[0].created_at >= w[1].created_at),
        "actions should be sorted newest first"
    );

    let failed = store
        .query_actions(
            &ActionQuery::default()
                .for_rule("conf-query")
                .with_status(ActionStatus::Failed),
        )
        .await?;
    assert_eq!(failed.total, 3);

    let page = store
        .query_actions(&ActionQuery::default().for_rule("conf-query").paginate(2, 4))
        .await?;
    assert_eq!(page.total, 5);
    assert_eq!(page.actions.len(), 1);
    assert_eq!(page.limit, 2);
    assert_eq!(page.offset, 4);
    Ok(())
}
