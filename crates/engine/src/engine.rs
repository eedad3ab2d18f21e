use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, instrument, warn};

use remedy_cluster::ClusterClient;
use remedy_core::{
    ActionId, ActionStatus, ClusterId, RemediationAction, RemediationEvent, RemediationRule,
    RuleId, ValidationError, ordered_steps,
};
use remedy_executor::{ExecutionContext, StepExecutor};
use remedy_notify::{ChatMessage, ChatNotifier, WebhookNotifier};
use remedy_store::{ActionPage, ActionQuery, RemediationStore};

use crate::builtin::builtin_rules;
use crate::clients::ClusterRegistry;
use crate::condition;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::metrics::{EngineMetrics, MetricsSnapshot};
use crate::registry::RuleRegistry;
use crate::scheduler;

/// The remediation engine: matches events against rules, gates actions on
/// approval, and runs them on a bounded worker pool.
///
/// Cloning is cheap; all clones share the same state.
#[derive(Clone)]
pub struct RemediationEngine {
    pub(crate) inner: Arc<EngineInner>,
}

pub(crate) struct EngineInner {
    pub(crate) config: EngineConfig,
    pub(crate) store: Arc<dyn RemediationStore>,
    pub(crate) rules: RuleRegistry,
    pub(crate) clusters: ClusterRegistry,
    executor: StepExecutor,
    chat: Arc<dyn ChatNotifier>,
    webhook: Arc<dyn WebhookNotifier>,
    pub(crate) metrics: EngineMetrics,
    queue_tx: mpsc::Sender<RemediationAction>,
    queue_rx: tokio::sync::Mutex<mpsc::Receiver<RemediationAction>>,
    tracker: TaskTracker,
    pub(crate) cancel: CancellationToken,
    started: AtomicBool,
    /// Serializes approve and reject so two operators cannot both decide.
    decisions: tokio::sync::Mutex<()>,
}

/// Collaborators handed over by [`EngineBuilder`](crate::EngineBuilder).
pub(crate) struct EngineParts {
    pub config: EngineConfig,
    pub store: Arc<dyn RemediationStore>,
    pub executor: StepExecutor,
    pub chat: Arc<dyn ChatNotifier>,
    pub webhook: Arc<dyn WebhookNotifier>,
    pub clusters: Vec<(ClusterId, Arc<dyn ClusterClient>)>,
}

impl RemediationEngine {
    pub(crate) fn from_parts(parts: EngineParts) -> Self {
        let (queue_tx, queue_rx) = mpsc::channel(parts.config.queue_capacity);
        let clusters = ClusterRegistry::new();
        for (id, client) in parts.clusters {
            clusters.register(id, client);
        }
        Self {
            inner: Arc::new(EngineInner {
                config: parts.config,
                store: parts.store,
                rules: RuleRegistry::new(),
                clusters,
                executor: parts.executor,
                chat: parts.chat,
                webhook: parts.webhook,
                metrics: EngineMetrics::default(),
                queue_tx,
                queue_rx: tokio::sync::Mutex::new(queue_rx),
                tracker: TaskTracker::new(),
                cancel: CancellationToken::new(),
                started: AtomicBool::new(false),
                decisions: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    // -- Lifecycle -----------------------------------------------------------

    /// Seed the built-in rules, load enabled rules from the store, and spawn
    /// the workers and the schedule loop. Calling it again is a no-op.
    pub async fn start(&self) -> Result<(), EngineError> {
        let inner = &self.inner;
        if inner.started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let prepared = async {
            if inner.config.seed_builtin_rules {
                self.seed_builtin_rules().await?;
            }
            inner.resync_rules().await
        }
        .await;
        if let Err(e) = prepared {
            inner.started.store(false, Ordering::SeqCst);
            return Err(e);
        }

        for worker in 0..inner.config.max_concurrent_actions {
            inner.tracker.spawn(worker_loop(Arc::clone(inner), worker));
        }
        inner.tracker.spawn(scheduler::run(Arc::clone(inner)));

        info!(
            workers = inner.config.max_concurrent_actions,
            queue_capacity = inner.config.queue_capacity,
            rules = inner.rules.len(),
            "remediation engine started"
        );
        Ok(())
    }

    /// Stop pulling new work. Actions already executing run to completion.
    pub fn stop(&self) {
        if !self.inner.cancel.is_cancelled() {
            info!("remediation engine stopping");
        }
        self.inner.cancel.cancel();
    }

    /// Stop, then wait for in-flight actions and background tasks.
    pub async fn shutdown(&self) {
        self.stop();
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
        info!("remediation engine stopped");
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    // -- Cluster clients -----------------------------------------------------

    pub fn register_cluster_client(
        &self,
        cluster_id: impl Into<ClusterId>,
        client: Arc<dyn ClusterClient>,
    ) {
        let cluster_id = cluster_id.into();
        info!(cluster = %cluster_id, "cluster client registered");
        self.inner.clusters.register(cluster_id, client);
    }

    pub fn unregister_cluster_client(&self, cluster_id: &ClusterId) -> bool {
        self.inner.clusters.unregister(cluster_id)
    }

    pub fn cluster_ids(&self) -> Vec<ClusterId> {
        self.inner.clusters.ids()
    }

    // -- Events --------------------------------------------------------------

    /// Match an event against the loaded rules and submit an action for
    /// every rule that passes scope, conditions and cooldown.
    ///
    /// Returns the ids of the actions created. A rule whose submission fails
    /// is logged and skipped.
    #[instrument(
        skip_all,
        fields(cluster = %event.cluster_id, event_type = %event.event_type, reason = %event.reason)
    )]
    pub async fn process_event(
        &self,
        event: RemediationEvent,
    ) -> Result<Vec<ActionId>, EngineError> {
        let inner = &self.inner;
        if inner.cancel.is_cancelled() {
            return Err(EngineError::ShuttingDown);
        }
        inner.metrics.increment_events_received();

        let now = Utc::now();
        let mut created = Vec::new();
        for rule in inner.rules.matching(&event) {
            inner.metrics.increment_rules_matched();
            if !condition::evaluate(&rule.conditions, &event) {
                debug!(rule = %rule.name, "conditions not met");
                inner.metrics.increment_conditions_rejected();
                continue;
            }
            let Some(claim) = inner
                .rules
                .try_claim(&rule.id, now, inner.config.default_cooldown)
            else {
                debug!(rule = %rule.name, "rule cooling down");
                inner.metrics.increment_cooldown_skipped();
                continue;
            };
            match inner.submit(&rule, &event).await {
                Ok(id) => created.push(id),
                Err(e) => {
                    warn!(
                        rule = %rule.name,
                        error = %e,
                        "failed to submit action, cooldown released"
                    );
                    inner.rules.release(&rule.id, claim);
                }
            }
        }
        Ok(created)
    }

    // -- Approval ------------------------------------------------------------

    /// Approve a `pending_approval` action and enqueue it.
    ///
    /// When the queue is full the approval is rolled back, the action stays
    /// `pending_approval`, and [`EngineError::QueueFull`] is returned.
    #[instrument(skip(self), fields(action_id = %action_id))]
    pub async fn approve_action(
        &self,
        action_id: &ActionId,
        approver: &str,
    ) -> Result<RemediationAction, EngineError> {
        let inner = &self.inner;
        let _decision = inner.decisions.lock().await;
        let mut action = inner.pending_action(action_id).await?;

        action.approve(approver, Utc::now())?;
        inner.store.save_action(&action).await?;

        match inner.queue_tx.try_send(action.clone()) {
            Ok(()) => {
                inner.metrics.increment_approved();
                inner.metrics.increment_queued();
                info!(approver, rule = %action.rule_name, "action approved and queued");
                Ok(action)
            }
            Err(_) => {
                inner.metrics.increment_queue_full();
                warn!(approver, "action queue full, approval rolled back");
                action.revoke_approval()?;
                inner.store.save_action(&action).await?;
                Err(EngineError::QueueFull)
            }
        }
    }

    /// Reject a `pending_approval` action. Terminal; nothing is enqueued.
    #[instrument(skip(self, reason), fields(action_id = %action_id))]
    pub async fn reject_action(
        &self,
        action_id: &ActionId,
        rejector: &str,
        reason: &str,
    ) -> Result<RemediationAction, EngineError> {
        let inner = &self.inner;
        let _decision = inner.decisions.lock().await;
        let mut action = inner.pending_action(action_id).await?;

        action.reject(rejector, reason, Utc::now())?;
        inner.store.save_action(&action).await?;
        inner.metrics.increment_rejected();
        info!(rejector, reason, rule = %action.rule_name, "action rejected");
        Ok(action)
    }

    // -- Actions -------------------------------------------------------------

    pub async fn get_action(&self, action_id: &ActionId) -> Result<RemediationAction, EngineError> {
        self.inner
            .store
            .get_action(action_id)
            .await?
            .ok_or_else(|| EngineError::ActionNotFound(action_id.clone()))
    }

    pub async fn list_actions(&self, query: &ActionQuery) -> Result<ActionPage, EngineError> {
        Ok(self.inner.store.query_actions(query).await?)
    }

    // -- Rules ---------------------------------------------------------------

    /// Validate and persist a new rule. An empty id is replaced with a fresh
    /// one; bookkeeping fields are reset.
    #[instrument(skip_all, fields(rule = %rule.name))]
    pub async fn create_rule(
        &self,
        mut rule: RemediationRule,
    ) -> Result<RemediationRule, EngineError> {
        let inner = &self.inner;
        rule.validate()?;
        if rule.id.is_empty() {
            rule.id = RuleId::generate();
        } else if inner.store.get_rule(&rule.id).await?.is_some() {
            return Err(EngineError::RuleExists(rule.id));
        }
        if inner.name_taken(&rule.name, None).await? {
            return Err(EngineError::DuplicateRuleName(rule.name));
        }

        let now = Utc::now();
        rule.last_triggered = None;
        rule.execution_count = 0;
        rule.created_at = now;
        rule.updated_at = now;

        inner.store.save_rule(&rule).await?;
        inner.rules.upsert(rule.clone());
        info!(rule_id = %rule.id, enabled = rule.enabled, "rule created");
        Ok(rule)
    }

    /// Replace a rule's definition, keeping its id, creation time and
    /// execution bookkeeping.
    #[instrument(skip(self, rule), fields(rule_id = %id))]
    pub async fn update_rule(
        &self,
        id: &RuleId,
        mut rule: RemediationRule,
    ) -> Result<RemediationRule, EngineError> {
        let inner = &self.inner;
        let existing = inner
            .store
            .get_rule(id)
            .await?
            .ok_or_else(|| EngineError::RuleNotFound(id.clone()))?;
        rule.validate()?;
        if inner.name_taken(&rule.name, Some(id)).await? {
            return Err(EngineError::DuplicateRuleName(rule.name));
        }

        let existing = inner.with_live_bookkeeping(existing);
        rule.id = id.clone();
        rule.created_at = existing.created_at;
        rule.last_triggered = existing.last_triggered;
        rule.execution_count = existing.execution_count;
        rule.updated_at = Utc::now();

        inner.store.save_rule(&rule).await?;
        inner.rules.upsert(rule.clone());
        info!(rule = %rule.name, enabled = rule.enabled, "rule updated");
        Ok(rule)
    }

    #[instrument(skip(self), fields(rule_id = %id))]
    pub async fn delete_rule(&self, id: &RuleId) -> Result<(), EngineError> {
        if !self.inner.store.delete_rule(id).await? {
            return Err(EngineError::RuleNotFound(id.clone()));
        }
        self.inner.rules.remove(id);
        info!("rule deleted");
        Ok(())
    }

    pub async fn get_rule(&self, id: &RuleId) -> Result<RemediationRule, EngineError> {
        let rule = self
            .inner
            .store
            .get_rule(id)
            .await?
            .ok_or_else(|| EngineError::RuleNotFound(id.clone()))?;
        Ok(self.inner.with_live_bookkeeping(rule))
    }

    /// All rules, enabled or not, highest priority first.
    pub async fn list_rules(&self) -> Result<Vec<RemediationRule>, EngineError> {
        let rules = self.inner.store.list_rules().await?;
        Ok(rules
            .into_iter()
            .map(|r| self.inner.with_live_bookkeeping(r))
            .collect())
    }

    /// Bulk upsert rules, matching existing rules by name. Used by the rule
    /// file loader. Every rule is validated before any is written.
    pub async fn load_rules(&self, rules: Vec<RemediationRule>) -> Result<usize, EngineError> {
        let inner = &self.inner;
        for rule in &rules {
            rule.validate()?;
        }

        let existing = inner.store.list_rules().await?;
        let now = Utc::now();
        let count = rules.len();
        for mut rule in rules {
            if let Some(current) = existing.iter().find(|r| r.name == rule.name) {
                let current = inner.with_live_bookkeeping(current.clone());
                rule.id = current.id;
                rule.created_at = current.created_at;
                rule.last_triggered = current.last_triggered;
                rule.execution_count = current.execution_count;
            } else {
                if rule.id.is_empty() {
                    rule.id = RuleId::generate();
                }
                rule.created_at = now;
                rule.last_triggered = None;
                rule.execution_count = 0;
            }
            rule.updated_at = now;
            inner.store.save_rule(&rule).await?;
        }

        inner.resync_rules().await?;
        info!(count, "rules loaded");
        Ok(count)
    }

    /// Persist every built-in rule whose name is not taken yet.
    async fn seed_builtin_rules(&self) -> Result<(), EngineError> {
        let inner = &self.inner;
        let existing = inner.store.list_rules().await?;
        for rule in builtin_rules() {
            if existing.iter().any(|r| r.name == rule.name) {
                continue;
            }
            inner.store.save_rule(&rule).await?;
            debug!(rule = %rule.name, "seeded built-in rule");
        }
        Ok(())
    }
}

impl EngineInner {
    /// Reload the registry from the store's enabled rules.
    pub(crate) async fn resync_rules(&self) -> Result<(), EngineError> {
        let rules = self.store.load_enabled_rules().await?;
        self.rules.replace_all(rules);
        Ok(())
    }

    /// Build, persist and route one action for a rule that passed every
    /// check.
    #[instrument(skip_all, fields(rule = %rule.name))]
    pub(crate) async fn submit(
        &self,
        rule: &RemediationRule,
        event: &RemediationEvent,
    ) -> Result<ActionId, EngineError> {
        let headline = rule
            .headline_step()
            .ok_or_else(|| ValidationError::NoActions(rule.name.clone()))?;
        let dry_run = rule.dry_run || self.config.dry_run;
        let mut action = RemediationAction::new(rule, headline, event, dry_run);
        self.metrics.increment_actions_created();

        if rule.require_approval || self.config.require_approval {
            action.transition(ActionStatus::PendingApproval)?;
            self.store.save_action(&action).await?;
            self.metrics.increment_pending_approval();
            info!(
                action_id = %action.id,
                action_type = %action.action_type,
                resource = %action.resource_name,
                "action awaiting approval"
            );
            self.request_approval(&action);
            return Ok(action.id);
        }

        action.transition(ActionStatus::Queued)?;
        self.store.save_action(&action).await?;
        let id = action.id.clone();
        self.enqueue(action).await;
        Ok(id)
    }

    /// Hand a queued action to the workers. On a full queue the persisted
    /// `queued` row is left for an operator to find.
    async fn enqueue(&self, action: RemediationAction) {
        match self.queue_tx.try_send(action) {
            Ok(()) => self.metrics.increment_queued(),
            Err(TrySendError::Full(action) | TrySendError::Closed(action)) => {
                self.metrics.increment_queue_full();
                warn!(
                    action_id = %action.id,
                    rule = %action.rule_name,
                    "action queue full, action left queued"
                );
            }
        }
    }

    /// Send the approval prompt in the background.
    fn request_approval(&self, action: &RemediationAction) {
        let mut message = ChatMessage::new(approval_text(action));
        message.channel.clone_from(&self.config.approval_channel);
        let chat = Arc::clone(&self.chat);
        let action_id = action.id.clone();
        self.tracker.spawn(async move {
            if let Err(e) = chat.send(&message).await {
                error!(action_id = %action_id, error = %e, "failed to send approval request");
            }
        });
    }

    /// Fetch an action that must be awaiting a decision.
    async fn pending_action(&self, id: &ActionId) -> Result<RemediationAction, EngineError> {
        let action = self
            .store
            .get_action(id)
            .await?
            .ok_or_else(|| EngineError::ActionNotFound(id.clone()))?;
        if action.status != ActionStatus::PendingApproval {
            return Err(EngineError::InvalidState {
                action_id: id.clone(),
                status: action.status,
            });
        }
        Ok(action)
    }

    /// Whether another rule already uses `name`.
    async fn name_taken(&self, name: &str, except: Option<&RuleId>) -> Result<bool, EngineError> {
        let rules = self.store.list_rules().await?;
        Ok(rules
            .iter()
            .any(|r| r.name == name && Some(&r.id) != except))
    }

    /// Overlay the registry's cooldown stamp and count on a stored rule.
    fn with_live_bookkeeping(&self, mut rule: RemediationRule) -> RemediationRule {
        if let Some(live) = self.rules.get(&rule.id) {
            rule.last_triggered = rule.last_triggered.max(live.last_triggered);
            rule.execution_count = rule.execution_count.max(live.execution_count);
        }
        rule
    }

    /// Run one dequeued action to a terminal state.
    #[instrument(skip_all, fields(action_id = %action.id, rule = %action.rule_name))]
    async fn execute(&self, mut action: RemediationAction) {
        let Some(rule) = self.lookup_rule(&action.rule_id).await else {
            let message = format!("rule {} no longer exists", action.rule_id);
            warn!("{message}");
            if action
                .finish(ActionStatus::Failed, None, Some(message), Utc::now())
                .is_ok()
            {
                self.metrics.increment_failed();
                self.persist(&action).await;
            }
            return;
        };

        if let Err(e) = action.start(Utc::now()) {
            warn!(error = %e, "cannot start action");
            return;
        }
        self.persist(&action).await;
        info!(action_type = %action.action_type, dry_run = action.dry_run, "action running");

        let mut ctx = ExecutionContext::new(Arc::clone(&self.chat), Arc::clone(&self.webhook));
        if let Some(client) = self.clusters.get(&action.cluster_id) {
            ctx = ctx.with_cluster(client);
        }
        let steps = ordered_steps(&rule.actions);
        let report = self.executor.run(&action, &steps, &ctx).await;

        let finished_at = Utc::now();
        let status = report.status;
        if let Err(e) = action.finish(status, Some(report.result), report.error, finished_at) {
            warn!(error = %e, "cannot finish action");
            return;
        }
        self.persist(&action).await;

        match status {
            ActionStatus::Completed => self.metrics.increment_completed(),
            ActionStatus::CompletedWithErrors => self.metrics.increment_completed_with_errors(),
            _ => self.metrics.increment_failed(),
        }
        info!(
            status = %status,
            duration_ms = action.duration_ms.unwrap_or_default(),
            error = action.error.as_deref().unwrap_or(""),
            "action finished"
        );

        self.record_execution(&rule.id, finished_at).await;
    }

    /// The rule for a dequeued action: the registry first, then the store
    /// for rules disabled since the action was queued.
    async fn lookup_rule(&self, id: &RuleId) -> Option<RemediationRule> {
        if let Some(rule) = self.rules.get(id) {
            return Some(rule);
        }
        match self.store.get_rule(id).await {
            Ok(rule) => rule,
            Err(e) => {
                warn!(rule_id = %id, error = %e, "failed to load rule");
                None
            }
        }
    }

    /// Stamp `last_triggered` and bump `execution_count` in the registry
    /// and the store.
    async fn record_execution(&self, id: &RuleId, at: DateTime<Utc>) {
        let live = self.rules.record_execution(id, at);
        let stored = match self.store.get_rule(id).await {
            Ok(Some(rule)) => rule,
            Ok(None) => return,
            Err(e) => {
                warn!(rule_id = %id, error = %e, "failed to load rule for bookkeeping");
                return;
            }
        };
        let mut stored = stored;
        if let Some(live) = live {
            stored.last_triggered = live.last_triggered;
            stored.execution_count = live.execution_count;
        } else {
            stored.last_triggered = Some(stored.last_triggered.map_or(at, |last| last.max(at)));
            stored.execution_count += 1;
        }
        if let Err(e) = self.store.save_rule(&stored).await {
            warn!(rule_id = %id, error = %e, "failed to persist rule bookkeeping");
        }
    }

    /// Save an action from the worker path. Failures are logged only.
    async fn persist(&self, action: &RemediationAction) {
        if let Err(e) = self.store.save_action(action).await {
            warn!(action_id = %action.id, status = %action.status, error = %e, "failed to persist action");
        }
    }
}

/// One long-lived worker: pull, execute, repeat until cancelled.
async fn worker_loop(inner: Arc<EngineInner>, worker: usize) {
    debug!(worker, "worker started");
    loop {
        let next = {
            let mut rx = inner.queue_rx.lock().await;
            tokio::select! {
                biased;
                () = inner.cancel.cancelled() => None,
                action = rx.recv() => action,
            }
        };
        let Some(action) = next else {
            break;
        };
        inner.execute(action).await;
    }
    debug!(worker, "worker stopped");
}

fn approval_text(action: &RemediationAction) -> String {
    let mode = if action.dry_run { " (dry run)" } else { "" };
    format!(
        "Approval needed for `{}`{mode}: {} on {} {}/{} in cluster {} (action {})",
        action.rule_name,
        action.action_type,
        action.resource_type,
        action.namespace,
        action.resource_name,
        action.cluster_id,
        action.id
    )
}
