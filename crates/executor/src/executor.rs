use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use remedy_cluster::ClusterClient;
use remedy_core::{
    ActionResult, ActionStatus, ActionStep, FailurePolicy, RemediationAction, ResolvedTarget,
    ResourceKind, StepKind, StepOutcome, StepStatus,
};
use remedy_notify::{ChatMessage, WebhookPayload};

use crate::config::ExecutorConfig;
use crate::context::ExecutionContext;
use crate::error::ExecutionError;

/// Final state of one action run.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    /// `completed`, `completed_with_errors` or `failed`.
    pub status: ActionStatus,
    pub result: ActionResult,
    /// The last step error, if any step failed.
    pub error: Option<String>,
}

impl ExecutionReport {
    fn new(status: ActionStatus, steps: Vec<StepOutcome>, error: Option<String>) -> Self {
        Self {
            status,
            result: ActionResult { steps },
            error,
        }
    }
}

/// How a successful attempt ended.
enum StepDone {
    Done(Option<String>),
    /// Nothing to do, e.g. the node was already cordoned.
    Skipped(String),
}

/// Runs a rule's ordered steps for one action, applying each step's
/// failure policy.
pub struct StepExecutor {
    config: ExecutorConfig,
}

impl StepExecutor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Execute `steps` for `action` in the given order.
    ///
    /// An erroring step under `abort`, or under `retry` once its attempts are
    /// exhausted, fails the action and skips the remaining steps. Under
    /// `continue` the error is recorded and the run ends
    /// `completed_with_errors`.
    #[instrument(skip_all, fields(action_id = %action.id, rule = %action.rule_name))]
    pub async fn run(
        &self,
        action: &RemediationAction,
        steps: &[&ActionStep],
        ctx: &ExecutionContext,
    ) -> ExecutionReport {
        if !action.dry_run && ctx.cluster.is_none() && steps.iter().any(|s| s.kind.needs_cluster())
        {
            let err = ExecutionError::NoClusterClient(action.cluster_id.to_string());
            warn!(cluster = %action.cluster_id, "cannot execute action: {err}");
            return ExecutionReport::new(ActionStatus::Failed, Vec::new(), Some(err.to_string()));
        }

        let mut outcomes = Vec::with_capacity(steps.len());
        let mut last_error = None;
        let mut continued_past_error = false;

        for step in steps {
            let target = step.target.resolve(&action.trigger);

            if action.dry_run {
                info!(
                    step = step.order,
                    action_type = %step.action_type(),
                    target = ?target,
                    "dry run: step not executed"
                );
                outcomes.push(StepOutcome {
                    order: step.order,
                    action_type: step.action_type(),
                    target,
                    status: StepStatus::Skipped,
                    attempts: 0,
                    error: None,
                    output: Some("dry run".to_owned()),
                });
                continue;
            }

            let (outcome, error) = self.run_step(action, step, target, ctx).await;
            outcomes.push(outcome);

            if let Some(error) = error {
                last_error = Some(error);
                match step.on_failure {
                    FailurePolicy::Continue => continued_past_error = true,
                    FailurePolicy::Abort | FailurePolicy::Retry => {
                        return ExecutionReport::new(ActionStatus::Failed, outcomes, last_error);
                    }
                }
            }
        }

        let status = if continued_past_error {
            ActionStatus::CompletedWithErrors
        } else {
            ActionStatus::Completed
        };
        ExecutionReport::new(status, outcomes, last_error)
    }

    /// Run one step through its attempt budget. Returns the outcome and,
    /// when every attempt failed, the final error message.
    async fn run_step(
        &self,
        action: &RemediationAction,
        step: &ActionStep,
        target: Option<ResolvedTarget>,
        ctx: &ExecutionContext,
    ) -> (StepOutcome, Option<String>) {
        let max_attempts = match step.on_failure {
            FailurePolicy::Retry => step.max_retries.saturating_add(1),
            FailurePolicy::Abort | FailurePolicy::Continue => 1,
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            debug!(step = step.order, action_type = %step.action_type(), attempt, "executing step");

            let failure = match self.attempt(action, step, target.as_ref(), ctx).await {
                Ok(done) => {
                    let (status, output) = match done {
                        StepDone::Done(output) => (StepStatus::Succeeded, output),
                        StepDone::Skipped(reason) => (StepStatus::Skipped, Some(reason)),
                    };
                    let outcome = StepOutcome {
                        order: step.order,
                        action_type: step.action_type(),
                        target,
                        status,
                        attempts: attempt,
                        error: None,
                        output,
                    };
                    return (outcome, None);
                }
                Err(err) => err,
            };

            warn!(
                step = step.order,
                action_type = %step.action_type(),
                attempt,
                max_attempts,
                error = %failure,
                "step failed"
            );

            if attempt < max_attempts {
                let delay = self.config.retry_strategy.delay_for(attempt - 1);
                tokio::time::sleep(delay).await;
                continue;
            }

            let message = failure.to_string();
            let outcome = StepOutcome {
                order: step.order,
                action_type: step.action_type(),
                target,
                status: StepStatus::Failed,
                attempts: attempt,
                error: Some(message.clone()),
                output: None,
            };
            return (outcome, Some(message));
        }
    }

    async fn attempt(
        &self,
        action: &RemediationAction,
        step: &ActionStep,
        target: Option<&ResolvedTarget>,
        ctx: &ExecutionContext,
    ) -> Result<StepDone, ExecutionError> {
        let name = step.action_type().as_str();
        let cluster = || {
            ctx.cluster
                .as_deref()
                .ok_or_else(|| ExecutionError::NoClusterClient(action.cluster_id.to_string()))
        };
        let target = || target.ok_or(ExecutionError::MissingTarget(name));

        match &step.kind {
            StepKind::RestartPod {
                grace_period_seconds,
            } => {
                let t = target()?;
                expect_kind(t, &[ResourceKind::Pod], name)?;
                let grace = grace_or(*grace_period_seconds, self.config.restart_grace_period);
                self.timed(cluster()?.delete_pod(&t.namespace, &t.name, grace))
                    .await?;
                Ok(StepDone::Done(Some(format!(
                    "pod {}/{} deleted for restart",
                    t.namespace, t.name
                ))))
            }
            StepKind::Delete {
                grace_period_seconds,
            } => {
                let t = target()?;
                expect_kind(t, &[ResourceKind::Pod], name)?;
                let grace = grace_or(*grace_period_seconds, self.config.delete_grace_period);
                self.timed(cluster()?.delete_pod(&t.namespace, &t.name, grace))
                    .await?;
                Ok(StepDone::Done(Some(format!(
                    "pod {}/{} deleted",
                    t.namespace, t.name
                ))))
            }
            StepKind::Scale { replicas } => {
                let t = target()?;
                let kind = expect_kind(
                    t,
                    &[ResourceKind::Deployment, ResourceKind::StatefulSet],
                    name,
                )?;
                let client = cluster()?;
                let current = self
                    .timed(client.get_scale(kind, &t.namespace, &t.name))
                    .await?;
                self.timed(client.set_scale(kind, &t.namespace, &t.name, *replicas))
                    .await?;
                Ok(StepDone::Done(Some(format!(
                    "{kind} {}/{} scaled from {current} to {replicas}",
                    t.namespace, t.name
                ))))
            }
            StepKind::Patch { path, value } => {
                let t = target()?;
                let kind = expect_kind(
                    t,
                    &[
                        ResourceKind::Deployment,
                        ResourceKind::StatefulSet,
                        ResourceKind::DaemonSet,
                        ResourceKind::PersistentVolumeClaim,
                    ],
                    name,
                )?;
                self.timed(
                    cluster()?.json_patch(kind, &t.namespace, &t.name, path, value),
                )
                .await?;
                Ok(StepDone::Done(Some(format!(
                    "{kind} {}/{} patched at {path}",
                    t.namespace, t.name
                ))))
            }
            StepKind::Cordon => {
                let t = target()?;
                expect_kind(t, &[ResourceKind::Node], name)?;
                if self.cordon_node(cluster()?, &t.name).await? {
                    Ok(StepDone::Done(Some(format!("node {} cordoned", t.name))))
                } else {
                    Ok(StepDone::Skipped(format!(
                        "node {} already unschedulable",
                        t.name
                    )))
                }
            }
            StepKind::Drain {
                grace_period_seconds,
            } => {
                let t = target()?;
                expect_kind(t, &[ResourceKind::Node], name)?;
                let grace = grace_or(*grace_period_seconds, self.config.restart_grace_period);
                self.drain_node(cluster()?, &t.name, grace).await
            }
            StepKind::Exec { command, container } => {
                let t = target()?;
                expect_kind(t, &[ResourceKind::Pod], name)?;
                let stdout = self
                    .timed(cluster()?.exec(
                        &t.namespace,
                        &t.name,
                        container.as_deref(),
                        command,
                    ))
                    .await?;
                Ok(StepDone::Done(Some(stdout)))
            }
            StepKind::Notify { channel, message } => {
                let text = message.clone().unwrap_or_else(|| summary(action));
                let chat = ChatMessage {
                    channel: channel.clone(),
                    text,
                };
                self.timed(ctx.chat.send(&chat)).await?;
                Ok(StepDone::Done(None))
            }
            StepKind::Webhook { url, headers } => {
                let payload = WebhookPayload {
                    action_id: action.id.to_string(),
                    rule_name: action.rule_name.clone(),
                    resource_type: action.resource_type.clone(),
                    resource_name: action.resource_name.clone(),
                    namespace: action.namespace.clone(),
                    cluster_id: action.cluster_id.to_string(),
                    parameters: serde_json::to_value(&action.parameters)
                        .unwrap_or(serde_json::Value::Null),
                    timestamp: Utc::now(),
                };
                self.timed(ctx.webhook.post(url, headers, &payload))
                    .await?;
                Ok(StepDone::Done(Some(format!("posted to {url}"))))
            }
        }
    }

    /// Mark a node unschedulable. Returns `false` when it already was.
    async fn cordon_node(
        &self,
        client: &dyn ClusterClient,
        node: &str,
    ) -> Result<bool, ExecutionError> {
        let mut info = self.timed(client.get_node(node)).await?;
        if info.unschedulable {
            debug!(node, "node already unschedulable");
            return Ok(false);
        }
        info.unschedulable = true;
        self.timed(client.update_node(&info)).await?;
        info!(node, "node cordoned");
        Ok(true)
    }

    /// Cordon, then evict every pod on the node not owned by a DaemonSet.
    /// Individual eviction failures are logged and counted but do not fail
    /// the step.
    async fn drain_node(
        &self,
        client: &dyn ClusterClient,
        node: &str,
        grace: Duration,
    ) -> Result<StepDone, ExecutionError> {
        self.cordon_node(client, node).await?;
        let pods = self.timed(client.list_pods_on_node(node)).await?;

        let mut evicted = 0usize;
        let mut kept = 0usize;
        let mut failed = Vec::new();
        for pod in pods {
            if pod.is_daemonset_pod() {
                kept += 1;
                continue;
            }
            match self
                .timed(client.delete_pod(&pod.namespace, &pod.name, grace))
                .await
            {
                Ok(()) => evicted += 1,
                Err(e) => {
                    warn!(node, pod = %pod.name, namespace = %pod.namespace, error = %e, "eviction failed");
                    failed.push(format!("{}/{}", pod.namespace, pod.name));
                }
            }
        }

        info!(node, evicted, kept, failed = failed.len(), "node drained");
        let mut output =
            format!("node {node} drained: {evicted} evicted, {kept} daemonset pods kept");
        if !failed.is_empty() {
            output.push_str(&format!(", failed: {}", failed.join(", ")));
        }
        Ok(StepDone::Done(Some(output)))
    }

    async fn timed<T, E>(
        &self,
        fut: impl Future<Output = Result<T, E>>,
    ) -> Result<T, ExecutionError>
    where
        E: Into<ExecutionError>,
    {
        match self.config.step_timeout {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .map_err(|_| ExecutionError::Timeout(limit))?
                .map_err(Into::into),
            None => fut.await.map_err(Into::into),
        }
    }
}

fn grace_or(seconds: Option<u32>, default: Duration) -> Duration {
    seconds.map_or(default, |s| Duration::from_secs(u64::from(s)))
}

fn expect_kind(
    target: &ResolvedTarget,
    allowed: &[ResourceKind],
    step: &str,
) -> Result<ResourceKind, ExecutionError> {
    match target.kind() {
        Some(kind) if allowed.contains(&kind) => Ok(kind),
        _ => Err(ExecutionError::Unsupported(format!(
            "{step} on {} {}",
            target.resource_type, target.name
        ))),
    }
}

/// Default text for `notify` steps without a message.
fn summary(action: &RemediationAction) -> String {
    format!(
        "Remediation `{}`: {} on {} {}/{} in cluster {}",
        action.rule_name,
        action.action_type,
        action.resource_type,
        action.namespace,
        action.resource_name,
        action.cluster_id
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use remedy_cluster::{ClusterCall, NodeInfo, PodInfo, RecordingClusterClient};
    use remedy_core::{RemediationEvent, RemediationRule, StepTarget, Trigger, ordered_steps};
    use remedy_notify::RecordingNotifier;

    use super::*;
    use crate::retry::RetryStrategy;

    // -- Helpers --------------------------------------------------------------

    fn fast_config() -> ExecutorConfig {
        ExecutorConfig {
            retry_strategy: RetryStrategy::Constant {
                delay: Duration::from_millis(1),
            },
            ..ExecutorConfig::default()
        }
    }

    fn pod_event() -> RemediationEvent {
        RemediationEvent::new("Warning", "prod")
            .with_resource("Pod", "default", "app-1")
            .with_reason("BackOff")
    }

    fn node_event(node: &str) -> RemediationEvent {
        RemediationEvent::new("Warning", "prod")
            .with_resource("Node", "", node)
            .with_reason("NodeNotReady")
    }

    fn rule_with(steps: Vec<ActionStep>) -> RemediationRule {
        steps
            .into_iter()
            .fold(RemediationRule::new("test", Trigger::event(["Warning"])), |r, s| {
                r.with_step(s)
            })
    }

    struct Harness {
        cluster: Arc<RecordingClusterClient>,
        notifier: Arc<RecordingNotifier>,
        ctx: ExecutionContext,
    }

    fn harness(cluster: RecordingClusterClient) -> Harness {
        let cluster = Arc::new(cluster);
        let notifier = Arc::new(RecordingNotifier::new());
        let ctx = ExecutionContext::new(notifier.clone(), notifier.clone())
            .with_cluster(cluster.clone());
        Harness {
            cluster,
            notifier,
            ctx,
        }
    }

    async fn run(
        executor: &StepExecutor,
        rule: &RemediationRule,
        event: &RemediationEvent,
        dry_run: bool,
        ctx: &ExecutionContext,
    ) -> ExecutionReport {
        let headline = rule.headline_step().unwrap();
        let action = RemediationAction::new(rule, headline, event, dry_run);
        executor.run(&action, &ordered_steps(&rule.actions), ctx).await
    }

    fn restart() -> ActionStep {
        ActionStep::new(StepKind::RestartPod {
            grace_period_seconds: None,
        })
    }

    fn notify() -> ActionStep {
        ActionStep::new(StepKind::Notify {
            channel: None,
            message: Some("done".into()),
        })
    }

    // -- Tests ----------------------------------------------------------------

    #[tokio::test]
    async fn restart_pod_uses_default_grace_period() {
        let h = harness(RecordingClusterClient::new());
        let executor = StepExecutor::new(fast_config());
        let rule = rule_with(vec![restart()]);

        let report = run(&executor, &rule, &pod_event(), false, &h.ctx).await;

        assert_eq!(report.status, ActionStatus::Completed);
        assert!(report.error.is_none());
        assert_eq!(
            h.cluster.calls(),
            vec![ClusterCall::DeletePod {
                namespace: "default".into(),
                name: "app-1".into(),
                grace_period: Duration::from_secs(30),
            }]
        );
        assert_eq!(report.result.steps[0].status, StepStatus::Succeeded);
        assert_eq!(report.result.steps[0].attempts, 1);
    }

    #[tokio::test]
    async fn abort_halts_later_steps() {
        let h = harness(RecordingClusterClient::new());
        h.cluster.fail_target("delete_pod", "app-1");
        let executor = StepExecutor::new(fast_config());
        let rule = rule_with(vec![restart(), notify().with_order(1)]);

        let report = run(&executor, &rule, &pod_event(), false, &h.ctx).await;

        assert_eq!(report.status, ActionStatus::Failed);
        assert_eq!(report.result.steps.len(), 1);
        assert!(report.error.is_some());
        assert!(h.notifier.messages().is_empty());
    }

    #[tokio::test]
    async fn continue_runs_later_steps_and_marks_errors() {
        let h = harness(RecordingClusterClient::new());
        h.cluster.fail_target("delete_pod", "app-1");
        let executor = StepExecutor::new(fast_config());
        let rule = rule_with(vec![restart().continue_on_failure(), notify().with_order(1)]);

        let report = run(&executor, &rule, &pod_event(), false, &h.ctx).await;

        assert_eq!(report.status, ActionStatus::CompletedWithErrors);
        assert_eq!(report.result.steps.len(), 2);
        assert_eq!(report.result.steps[0].status, StepStatus::Failed);
        assert_eq!(report.result.steps[1].status, StepStatus::Succeeded);
        assert_eq!(report.result.errors().count(), 1);
        assert!(report.error.is_some());
        assert_eq!(h.notifier.messages().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_succeeds_on_third_attempt() {
        let h = harness(RecordingClusterClient::new());
        h.cluster.fail_times("delete_pod", 2);
        let executor = StepExecutor::new(ExecutorConfig::default());
        let rule = rule_with(vec![restart().with_retries(3)]);

        let report = run(&executor, &rule, &pod_event(), false, &h.ctx).await;

        assert_eq!(report.status, ActionStatus::Completed);
        assert_eq!(report.result.steps[0].attempts, 3);
        assert_eq!(h.cluster.calls_of("delete_pod").len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_exhausted_fails_action() {
        let h = harness(RecordingClusterClient::new());
        h.cluster.fail_times("delete_pod", 10);
        let executor = StepExecutor::new(fast_config());
        let rule = rule_with(vec![restart().with_retries(2), notify().with_order(1)]);

        let report = run(&executor, &rule, &pod_event(), false, &h.ctx).await;

        assert_eq!(report.status, ActionStatus::Failed);
        assert_eq!(report.result.steps[0].attempts, 3);
        assert!(h.notifier.messages().is_empty());
    }

    #[tokio::test]
    async fn drain_skips_daemonset_pods() {
        let cluster = RecordingClusterClient::new()
            .with_node(NodeInfo::new("worker-1"))
            .with_pod(PodInfo::new("shop", "web-1").on_node("worker-1").owned_by("ReplicaSet"))
            .with_pod(
                PodInfo::new("kube-system", "fluentd-x")
                    .on_node("worker-1")
                    .owned_by("DaemonSet"),
            )
            .with_pod(PodInfo::new("shop", "web-2").on_node("worker-2"));
        let h = harness(cluster);
        let executor = StepExecutor::new(fast_config());
        let rule = rule_with(vec![ActionStep::new(StepKind::Drain {
            grace_period_seconds: Some(5),
        })]);

        let report = run(&executor, &rule, &node_event("worker-1"), false, &h.ctx).await;

        assert_eq!(report.status, ActionStatus::Completed);
        assert!(h.cluster.node("worker-1").unwrap().unschedulable);
        let deleted: Vec<_> = h.cluster.calls_of("delete_pod");
        assert_eq!(
            deleted,
            vec![ClusterCall::DeletePod {
                namespace: "shop".into(),
                name: "web-1".into(),
                grace_period: Duration::from_secs(5),
            }]
        );
        let remaining: Vec<String> = h.cluster.pods().into_iter().map(|p| p.name).collect();
        assert_eq!(remaining, vec!["fluentd-x", "web-2"]);
    }

    #[tokio::test]
    async fn drain_tolerates_eviction_failures() {
        let cluster = RecordingClusterClient::new()
            .with_node(NodeInfo::new("worker-1"))
            .with_pod(PodInfo::new("shop", "web-1").on_node("worker-1"))
            .with_pod(PodInfo::new("shop", "web-2").on_node("worker-1"));
        let h = harness(cluster);
        h.cluster.fail_target("delete_pod", "web-1");
        let executor = StepExecutor::new(fast_config());
        let rule = rule_with(vec![ActionStep::new(StepKind::Drain {
            grace_period_seconds: None,
        })]);

        let report = run(&executor, &rule, &node_event("worker-1"), false, &h.ctx).await;

        assert_eq!(report.status, ActionStatus::Completed);
        let output = report.result.steps[0].output.clone().unwrap();
        assert!(output.contains("1 evicted"), "{output}");
        assert!(output.contains("shop/web-1"), "{output}");
    }

    #[tokio::test]
    async fn cordon_skips_unschedulable_node() {
        let mut node = NodeInfo::new("worker-1");
        node.unschedulable = true;
        let h = harness(RecordingClusterClient::new().with_node(node));
        let executor = StepExecutor::new(fast_config());
        let rule = rule_with(vec![ActionStep::new(StepKind::Cordon)]);

        let report = run(&executor, &rule, &node_event("worker-1"), false, &h.ctx).await;

        assert_eq!(report.status, ActionStatus::Completed);
        assert_eq!(report.result.steps[0].status, StepStatus::Skipped);
        assert!(h.cluster.mutations().is_empty());
    }

    #[tokio::test]
    async fn scale_overwrites_replicas() {
        let cluster =
            RecordingClusterClient::new().with_scale(ResourceKind::Deployment, "shop", "web", 2);
        let h = harness(cluster);
        let executor = StepExecutor::new(fast_config());
        let rule = rule_with(vec![ActionStep::new(StepKind::Scale { replicas: 5 }).with_target(
            StepTarget::Named {
                kind: ResourceKind::Deployment,
                name: "web".into(),
                namespace: Some("shop".into()),
            },
        )]);

        let report = run(&executor, &rule, &pod_event(), false, &h.ctx).await;

        assert_eq!(report.status, ActionStatus::Completed);
        assert_eq!(
            h.cluster.scale(ResourceKind::Deployment, "shop", "web"),
            Some(5)
        );
    }

    #[tokio::test]
    async fn patch_resolves_target_from_label() {
        let h = harness(RecordingClusterClient::new());
        let executor = StepExecutor::new(fast_config());
        let rule = rule_with(vec![ActionStep::new(StepKind::Patch {
            path: "/spec/template/spec/containers/0/resources/limits/memory".into(),
            value: serde_json::json!("1Gi"),
        })
        .with_target(StepTarget::Label {
            kind: ResourceKind::Deployment,
            label: "app".into(),
        })]);
        let event = pod_event().with_label("app", "checkout");

        let report = run(&executor, &rule, &event, false, &h.ctx).await;

        assert_eq!(report.status, ActionStatus::Completed);
        let patches = h.cluster.calls_of("json_patch");
        assert!(matches!(
            &patches[0],
            ClusterCall::JsonPatch { kind: ResourceKind::Deployment, name, .. } if name == "checkout"
        ));
    }

    #[tokio::test]
    async fn delete_of_non_pod_is_unsupported() {
        let h = harness(RecordingClusterClient::new());
        let executor = StepExecutor::new(fast_config());
        let rule = rule_with(vec![ActionStep::new(StepKind::Delete {
            grace_period_seconds: None,
        })
        .with_target(StepTarget::Named {
            kind: ResourceKind::Deployment,
            name: "web".into(),
            namespace: None,
        })]);

        let report = run(&executor, &rule, &pod_event(), false, &h.ctx).await;

        assert_eq!(report.status, ActionStatus::Failed);
        assert!(report.error.unwrap().starts_with("unsupported"));
        assert!(h.cluster.calls().is_empty());
    }

    #[tokio::test]
    async fn dry_run_makes_no_calls() {
        let h = harness(RecordingClusterClient::new());
        let executor = StepExecutor::new(fast_config());
        let rule = rule_with(vec![restart(), notify().with_order(1)]);

        let report = run(&executor, &rule, &pod_event(), true, &h.ctx).await;

        assert_eq!(report.status, ActionStatus::Completed);
        assert!(
            report
                .result
                .steps
                .iter()
                .all(|s| s.status == StepStatus::Skipped)
        );
        assert!(h.cluster.calls().is_empty());
        assert!(h.notifier.messages().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_call_times_out() {
        let h = harness(RecordingClusterClient::new().with_delay(Duration::from_secs(10)));
        let executor = StepExecutor::new(ExecutorConfig {
            step_timeout: Some(Duration::from_secs(1)),
            ..fast_config()
        });
        let rule = rule_with(vec![restart()]);

        let report = run(&executor, &rule, &pod_event(), false, &h.ctx).await;

        assert_eq!(report.status, ActionStatus::Failed);
        assert!(report.error.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn missing_cluster_client_fails_action() {
        let notifier = Arc::new(RecordingNotifier::new());
        let ctx = ExecutionContext::new(notifier.clone(), notifier);
        let executor = StepExecutor::new(fast_config());
        let rule = rule_with(vec![restart()]);

        let report = run(&executor, &rule, &pod_event(), false, &ctx).await;

        assert_eq!(report.status, ActionStatus::Failed);
        assert!(report.error.unwrap().contains("no cluster client"));
    }

    #[tokio::test]
    async fn notify_only_rules_need_no_cluster() {
        let notifier = Arc::new(RecordingNotifier::new());
        let ctx = ExecutionContext::new(notifier.clone(), notifier.clone());
        let executor = StepExecutor::new(fast_config());
        let rule = rule_with(vec![ActionStep::new(StepKind::Notify {
            channel: Some("#sre".into()),
            message: None,
        })]);

        let report = run(&executor, &rule, &pod_event(), false, &ctx).await;

        assert_eq!(report.status, ActionStatus::Completed);
        let sent = notifier.messages();
        assert_eq!(sent[0].channel.as_deref(), Some("#sre"));
        assert!(sent[0].text.contains("app-1"));
    }

    #[tokio::test]
    async fn webhook_posts_action_payload() {
        let h = harness(RecordingClusterClient::new());
        let executor = StepExecutor::new(fast_config());
        let rule = rule_with(vec![ActionStep::new(StepKind::Webhook {
            url: "https://hooks.example.com/remedy".into(),
            headers: std::iter::once(("X-Token".to_owned(), "t".to_owned())).collect(),
        })]);

        let report = run(&executor, &rule, &pod_event(), false, &h.ctx).await;

        assert_eq!(report.status, ActionStatus::Completed);
        let hooks = h.notifier.webhooks();
        assert_eq!(hooks.len(), 1);
        assert_eq!(hooks[0].url, "https://hooks.example.com/remedy");
        assert_eq!(hooks[0].headers.get("X-Token").map(String::as_str), Some("t"));
        assert_eq!(hooks[0].payload.resource_name, "app-1");
        assert_eq!(hooks[0].payload.cluster_id, "prod");
        assert_eq!(hooks[0].payload.parameters["type"], "webhook");
    }
}
