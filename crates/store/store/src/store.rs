use async_trait::async_trait;

use remedy_core::{ActionId, RemediationAction, RemediationRule, RuleId};

use crate::error::StoreError;
use crate::query::{ActionPage, ActionQuery};

/// Persistence contract for remediation rules and actions.
///
/// Implementations must be `Send + Sync` to be shared across async tasks.
/// Both `save_*` methods are upserts keyed by id.
#[async_trait]
pub trait RemediationStore: Send + Sync {
    /// Load every rule with `enabled == true`.
    async fn load_enabled_rules(&self) -> Result<Vec<RemediationRule>, StoreError>;

    /// Insert or replace a rule.
    async fn save_rule(&self, rule: &RemediationRule) -> Result<(), StoreError>;

    /// Delete a rule. Returns `true` if it existed.
    async fn delete_rule(&self, id: &RuleId) -> Result<bool, StoreError>;

    /// Fetch a rule by id, enabled or not.
    async fn get_rule(&self, id: &RuleId) -> Result<Option<RemediationRule>, StoreError>;

    /// List all rules, highest priority first, then by name.
    async fn list_rules(&self) -> Result<Vec<RemediationRule>, StoreError>;

    /// Insert or replace an action.
    async fn save_action(&self, action: &RemediationAction) -> Result<(), StoreError>;

    /// Fetch an action by id.
    async fn get_action(&self, id: &ActionId) -> Result<Option<RemediationAction>, StoreError>;

    /// Query actions with filters and pagination, newest first.
    async fn query_actions(&self, query: &ActionQuery) -> Result<ActionPage, StoreError>;
}
