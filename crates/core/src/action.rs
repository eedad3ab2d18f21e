use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::event::RemediationEvent;
use crate::rule::RemediationRule;
use crate::step::{ActionStep, ActionType, ResolvedTarget, StepKind};
use crate::types::{ActionId, ClusterId, RuleId};

/// Lifecycle status of a remediation action.
///
/// ```text
/// pending -> queued -> running -> completed | completed_with_errors | failed
/// pending -> pending_approval -> queued | rejected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Pending,
    PendingApproval,
    Queued,
    Running,
    Completed,
    CompletedWithErrors,
    Failed,
    Rejected,
}

impl ActionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::PendingApproval => "pending_approval",
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::CompletedWithErrors => "completed_with_errors",
            Self::Failed => "failed",
            Self::Rejected => "rejected",
        }
    }

    /// Parse the wire name of a status.
    pub fn from_name(name: &str) -> Option<Self> {
        [
            Self::Pending,
            Self::PendingApproval,
            Self::Queued,
            Self::Running,
            Self::Completed,
            Self::CompletedWithErrors,
            Self::Failed,
            Self::Rejected,
        ]
        .into_iter()
        .find(|s| s.as_str() == name)
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::CompletedWithErrors | Self::Failed | Self::Rejected
        )
    }

    /// Whether the state machine permits moving from `self` to `next`.
    ///
    /// `queued -> failed` covers actions that never reach a worker;
    /// `queued -> pending_approval` covers an approval rolled back because
    /// the queue was full.
    pub fn can_transition_to(self, next: Self) -> bool {
        use ActionStatus::{
            Completed, CompletedWithErrors, Failed, Pending, PendingApproval, Queued, Rejected,
            Running,
        };
        matches!(
            (self, next),
            (Pending, Queued | PendingApproval)
                | (PendingApproval, Queued | Rejected)
                | (Queued, Running | Failed | PendingApproval)
                | (Running, Completed | CompletedWithErrors | Failed)
        )
    }
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single step within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Succeeded,
    Failed,
    /// Dry-run: logged, not executed.
    Skipped,
}

/// Per-step record kept in an action's result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub order: u32,
    pub action_type: ActionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<ResolvedTarget>,
    pub status: StepStatus,
    /// Number of attempts made, including the first.
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

/// Structured result of a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResult {
    pub steps: Vec<StepOutcome>,
}

impl ActionResult {
    /// Errors of every failed step, in execution order.
    pub fn errors(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().filter_map(|s| s.error.as_deref())
    }
}

/// Who rejected an action, when, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub rejected_by: String,
    pub rejected_at: DateTime<Utc>,
    pub reason: String,
}

/// One instantiated, persisted execution attempt of a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemediationAction {
    pub id: ActionId,
    pub rule_id: RuleId,
    /// Rule name at the time the action was built.
    pub rule_name: String,
    pub cluster_id: ClusterId,
    pub namespace: String,
    pub resource_type: String,
    pub resource_name: String,
    /// Type of the rule's headline step.
    pub action_type: ActionType,
    /// Parameters of the rule's headline step.
    pub parameters: StepKind,
    pub dry_run: bool,
    pub status: ActionStatus,
    /// The event that triggered this action.
    pub trigger: RemediationEvent,
    #[serde(default)]
    pub result: Option<ActionResult>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub approved_by: Option<String>,
    #[serde(default)]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub rejection: Option<Rejection>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
}

impl RemediationAction {
    /// Build a `pending` action for `rule` from its headline step.
    ///
    /// The target is resolved from the headline step against the event; when
    /// it cannot be resolved the event's own resource is used.
    #[must_use]
    pub fn new(
        rule: &RemediationRule,
        headline: &ActionStep,
        event: &RemediationEvent,
        dry_run: bool,
    ) -> Self {
        let target = headline.target.resolve(event).unwrap_or_else(|| ResolvedTarget {
            resource_type: event.resource_type.clone(),
            namespace: event.namespace.clone(),
            name: event.resource_name.clone(),
        });
        Self {
            id: ActionId::generate(),
            rule_id: rule.id.clone(),
            rule_name: rule.name.clone(),
            cluster_id: event.cluster_id.clone(),
            namespace: target.namespace,
            resource_type: target.resource_type,
            resource_name: target.name,
            action_type: headline.action_type(),
            parameters: headline.kind.clone(),
            dry_run,
            status: ActionStatus::Pending,
            trigger: event.clone(),
            result: None,
            error: None,
            approved_by: None,
            approved_at: None,
            rejection: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            duration_ms: None,
        }
    }

    /// Move to `next`, enforcing the status state machine.
    pub fn transition(&mut self, next: ActionStatus) -> Result<(), CoreError> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::InvalidTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        Ok(())
    }

    /// Enter `running` and stamp the start time.
    pub fn start(&mut self, at: DateTime<Utc>) -> Result<(), CoreError> {
        self.transition(ActionStatus::Running)?;
        self.started_at = Some(at);
        Ok(())
    }

    /// Enter a terminal state, stamping completion time and duration.
    pub fn finish(
        &mut self,
        status: ActionStatus,
        result: Option<ActionResult>,
        error: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        self.transition(status)?;
        self.result = result;
        self.error = error;
        self.completed_at = Some(at);
        let started = self.started_at.unwrap_or(self.created_at);
        self.duration_ms = Some(u64::try_from((at - started).num_milliseconds()).unwrap_or(0));
        Ok(())
    }

    /// Record an approval and move to `queued`.
    pub fn approve(&mut self, approver: &str, at: DateTime<Utc>) -> Result<(), CoreError> {
        self.transition(ActionStatus::Queued)?;
        self.approved_by = Some(approver.to_owned());
        self.approved_at = Some(at);
        Ok(())
    }

    /// Undo an approval whose enqueue failed.
    pub fn revoke_approval(&mut self) -> Result<(), CoreError> {
        self.transition(ActionStatus::PendingApproval)?;
        self.approved_by = None;
        self.approved_at = None;
        Ok(())
    }

    /// Record a rejection and move to `rejected`.
    pub fn reject(
        &mut self,
        rejector: &str,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        self.transition(ActionStatus::Rejected)?;
        self.rejection = Some(Rejection {
            rejected_by: rejector.to_owned(),
            rejected_at: at,
            reason: reason.to_owned(),
        });
        self.completed_at = Some(at);
        Ok(())
    }
}
