use thiserror::Error;

use remedy_core::{ActionId, ActionStatus, CoreError, RuleId, ValidationError};
use remedy_store::StoreError;

/// Errors returned by [`RemediationEngine`](crate::RemediationEngine)
/// operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("rule not found: {0}")]
    RuleNotFound(RuleId),

    #[error("action not found: {0}")]
    ActionNotFound(ActionId),

    /// The action is not in a state that allows the requested transition.
    #[error("action {action_id} is {status}")]
    InvalidState {
        action_id: ActionId,
        status: ActionStatus,
    },

    #[error("invalid rule: {0}")]
    Validation(#[from] ValidationError),

    #[error("a rule named {0:?} already exists")]
    DuplicateRuleName(String),

    #[error("a rule with id {0} already exists")]
    RuleExists(RuleId),

    /// The action queue is at capacity.
    #[error("action queue full")]
    QueueFull,

    /// The engine has been stopped and accepts no new events.
    #[error("engine is shutting down")]
    ShuttingDown,

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("configuration error: {0}")]
    Configuration(String),

    /// A rule file could not be read or parsed.
    #[error("rule file error: {0}")]
    RuleFile(String),
}

impl EngineError {
    /// Whether the error names a missing rule or action.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::RuleNotFound(_) | Self::ActionNotFound(_))
    }
}
