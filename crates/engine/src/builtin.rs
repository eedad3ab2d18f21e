//! Rules seeded on startup when no rule of the same name exists.

use std::time::Duration;

use serde_json::json;

use remedy_core::{ActionStep, RemediationRule, ResourceKind, StepKind, StepTarget, Trigger};

/// The built-in rule set. Ids are stable so re-seeding is idempotent.
pub fn builtin_rules() -> Vec<RemediationRule> {
    vec![
        crash_loop_restart(),
        oom_scale_up(),
        evicted_pod_cleanup(),
        pvc_expansion(),
        node_not_ready_cordon(),
    ]
}

fn crash_loop_restart() -> RemediationRule {
    RemediationRule::new(
        "crash-loop-restart",
        Trigger::event(["Warning"]).with_filter("reason", vec!["BackOff", "CrashLoopBackOff"]),
    )
    .with_id("builtin-crash-loop-restart")
    .with_description("Restart pods stuck in a crash loop")
    .with_step(ActionStep::new(StepKind::RestartPod {
        grace_period_seconds: Some(30),
    }))
    .with_cooldown(Duration::from_secs(600))
}

fn oom_scale_up() -> RemediationRule {
    RemediationRule::new(
        "oom-scale-up",
        Trigger::event(["Warning"]).with_filter("reason", "OOMKilled"),
    )
    .with_id("builtin-oom-scale-up")
    .with_description("Raise the memory limit of the deployment owning an OOM-killed pod")
    .with_step(
        ActionStep::new(StepKind::Patch {
            path: "/spec/template/spec/containers/0/resources/limits/memory".into(),
            value: json!("1Gi"),
        })
        .with_target(StepTarget::Label {
            kind: ResourceKind::Deployment,
            label: "app".into(),
        }),
    )
    .with_approval(true)
    .with_cooldown(Duration::from_secs(1800))
}

fn evicted_pod_cleanup() -> RemediationRule {
    RemediationRule::new(
        "evicted-pod-cleanup",
        Trigger::event(["Warning"]).with_filter("reason", "Evicted"),
    )
    .with_id("builtin-evicted-pod-cleanup")
    .with_description("Delete evicted pods")
    .with_step(ActionStep::new(StepKind::Delete {
        grace_period_seconds: Some(0),
    }))
    .with_cooldown(Duration::from_secs(60))
}

fn pvc_expansion() -> RemediationRule {
    RemediationRule::new(
        "pvc-expansion",
        Trigger::metric(
            "kubelet_volume_stats_used_bytes / kubelet_volume_stats_capacity_bytes",
            0.85,
            Duration::from_secs(300),
        )
        .with_filter("reason", "VolumeUsageHigh"),
    )
    .with_id("builtin-pvc-expansion")
    .with_description("Grow persistent volume claims that are nearly full")
    .with_step(ActionStep::new(StepKind::Patch {
        path: "/spec/resources/requests/storage".into(),
        value: json!("20Gi"),
    }))
    .with_approval(true)
}

fn node_not_ready_cordon() -> RemediationRule {
    RemediationRule::new(
        "node-not-ready-cordon",
        Trigger::event(Vec::<String>::new()).with_filter("reason", "NodeNotReady"),
    )
    .with_id("builtin-node-not-ready-cordon")
    .with_description("Cordon nodes that stop reporting ready and tell the on-call channel")
    .with_step(ActionStep::new(StepKind::Cordon).with_order(1))
    .with_step(
        ActionStep::new(StepKind::Notify {
            channel: None,
            message: None,
        })
        .with_order(2)
        .continue_on_failure(),
    )
    .with_approval(true)
}
