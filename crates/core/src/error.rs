use thiserror::Error;

/// Reasons a rule is rejected at creation or update time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("rule name must not be empty")]
    EmptyName,

    #[error("rule {0} has no action steps")]
    NoActions(String),

    #[error("schedule trigger requires a cron expression")]
    MissingSchedule,

    #[error("invalid cron expression {expr:?}: {reason}")]
    InvalidSchedule { expr: String, reason: String },

    #[error("metric trigger requires a query")]
    MissingMetricQuery,

    #[error("invalid regex in condition on {field}: {reason}")]
    InvalidRegex { field: String, reason: String },

    #[error("invalid action step {index}: {reason}")]
    InvalidStep { index: usize, reason: String },
}

/// Errors raised by the core action state machine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },
}
