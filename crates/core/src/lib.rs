//! Core data model for the remediation engine: events, rules with typed
//! action steps, and the action lifecycle.

pub mod action;
pub mod error;
pub mod event;
pub mod rule;
pub mod step;
pub mod types;

pub use action::{
    ActionResult, ActionStatus, Rejection, RemediationAction, StepOutcome, StepStatus,
};
pub use error::{CoreError, ValidationError};
pub use event::RemediationEvent;
pub use rule::{
    ConditionOperator, ConditionType, FilterValue, MetricTrigger, RemediationRule, RuleCondition,
    RuleScope, SCOPE_WILDCARD, Trigger, TriggerType,
};
pub use step::{
    ActionStep, ActionType, FailurePolicy, ResolvedTarget, ResourceKind, StepKind, StepTarget,
    ordered_steps,
};
pub use types::{ActionId, ClusterId, RuleId};
