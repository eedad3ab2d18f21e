use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use remedy_core::{ActionStatus, ActionType, RemediationAction, RuleId};

/// Default page size for action queries.
pub const DEFAULT_LIMIT: u32 = 50;

/// Upper bound on the page size for action queries.
pub const MAX_LIMIT: u32 = 1000;

/// Filter and pagination parameters for listing actions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionQuery {
    /// Filter by originating rule.
    pub rule_id: Option<RuleId>,
    /// Filter by target cluster.
    pub cluster_id: Option<String>,
    /// Filter by target namespace.
    pub namespace: Option<String>,
    /// Filter by status.
    pub status: Option<ActionStatus>,
    /// Filter by headline action type.
    pub action_type: Option<ActionType>,
    /// Only actions created at or after this time.
    pub from: Option<DateTime<Utc>>,
    /// Only actions created at or before this time.
    pub to: Option<DateTime<Utc>>,
    /// Maximum number of actions to return (default 50, max 1000).
    pub limit: Option<u32>,
    /// Number of actions to skip for pagination.
    pub offset: Option<u32>,
}

impl ActionQuery {
    /// Return the effective limit, clamped to 1..=1000, defaulting to 50.
    pub fn effective_limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    /// Return the effective offset, defaulting to 0.
    pub fn effective_offset(&self) -> u32 {
        self.offset.unwrap_or(0)
    }

    /// Whether an action satisfies every filter set on this query.
    ///
    /// Backends that cannot push filters down use this to filter in memory.
    pub fn matches(&self, action: &RemediationAction) -> bool {
        if let Some(ref rule_id) = self.rule_id
            && &action.rule_id != rule_id
        {
            return false;
        }
        if let Some(ref cluster) = self.cluster_id
            && action.cluster_id.as_str() != cluster
        {
            return false;
        }
        if let Some(ref ns) = self.namespace
            && &action.namespace != ns
        {
            return false;
        }
        if let Some(status) = self.status
            && action.status != status
        {
            return false;
        }
        if let Some(action_type) = self.action_type
            && action.action_type != action_type
        {
            return false;
        }
        if let Some(from) = self.from
            && action.created_at < from
        {
            return false;
        }
        if let Some(to) = self.to
            && action.created_at > to
        {
            return false;
        }
        true
    }

    #[must_use]
    pub fn for_rule(mut self, rule_id: impl Into<RuleId>) -> Self {
        self.rule_id = Some(rule_id.into());
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: ActionStatus) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn paginate(mut self, limit: u32, offset: u32) -> Self {
        self.limit = Some(limit);
        self.offset = Some(offset);
        self
    }
}

/// A page of actions, newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionPage {
    /// The actions on this page.
    pub actions: Vec<RemediationAction>,
    /// Total number of actions matching the query (before pagination).
    pub total: u64,
    /// The limit used for this page.
    pub limit: u32,
    /// The offset used for this page.
    pub offset: u32,
}
