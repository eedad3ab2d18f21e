//! Worker pool bounds and shutdown behaviour.

mod common;

use std::time::Duration;

use common::{Harness, backoff_event, bare_config};
use remedy_cluster::RecordingClusterClient;
use remedy_core::{ActionStatus, ActionStep, RemediationRule, StepKind, Trigger};
use remedy_engine::EngineConfig;

fn slow_restart_rule(name: &str) -> RemediationRule {
    RemediationRule::new(name, Trigger::event(["Warning"])).with_step(ActionStep::new(
        StepKind::RestartPod {
            grace_period_seconds: None,
        },
    ))
}

#[tokio::test]
async fn in_flight_actions_never_exceed_worker_count() {
    let config = EngineConfig {
        max_concurrent_actions: 2,
        ..bare_config()
    };
    let cluster = RecordingClusterClient::new().with_delay(Duration::from_millis(40));
    let h = Harness::start_with(config, cluster).await;
    for i in 0..6 {
        h.engine
            .create_rule(slow_restart_rule(&format!("rule-{i}")))
            .await
            .unwrap();
    }

    let ids = h.engine.process_event(backoff_event()).await.unwrap();
    assert_eq!(ids.len(), 6);
    for id in &ids {
        assert_eq!(h.wait_terminal(id).await.status, ActionStatus::Completed);
    }

    assert_eq!(h.cluster.calls_of("delete_pod").len(), 6);
    assert!(h.cluster.max_in_flight() <= 2);
    assert!(h.cluster.max_in_flight() >= 1);
    assert_eq!(h.engine.metrics().completed, 6);
    h.shutdown().await;
}

#[tokio::test]
async fn shutdown_waits_for_running_action() {
    let cluster = RecordingClusterClient::new().with_delay(Duration::from_millis(100));
    let h = Harness::start_with(bare_config(), cluster).await;
    h.engine
        .create_rule(slow_restart_rule("slow"))
        .await
        .unwrap();

    let ids = h.engine.process_event(backoff_event()).await.unwrap();
    // Let a worker pick the action up before stopping.
    for _ in 0..100 {
        if !h.cluster.calls().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    h.engine.shutdown().await;
    let action = h.engine.get_action(&ids[0]).await.unwrap();
    assert_eq!(action.status, ActionStatus::Completed);
}
