//! Rule-driven auto-remediation engine.
//!
//! Events are matched against the loaded rules, filtered by scope,
//! conditions and cooldown, and turned into persisted actions. Actions that
//! need a human decision wait in `pending_approval`; the rest are queued and
//! executed by a fixed pool of workers.

pub mod builder;
pub mod builtin;
pub mod clients;
pub mod condition;
pub mod config;
pub mod cooldown;
pub mod engine;
pub mod error;
pub mod loader;
pub mod matcher;
pub mod metrics;
pub mod registry;
pub mod scheduler;

pub use builder::EngineBuilder;
pub use builtin::builtin_rules;
pub use clients::ClusterRegistry;
pub use config::EngineConfig;
pub use engine::RemediationEngine;
pub use error::EngineError;
pub use loader::{RuleFormat, load_rules_from_dir, load_rules_from_str};
pub use metrics::{EngineMetrics, MetricsSnapshot};
pub use registry::{CooldownClaim, RuleRegistry};
pub use scheduler::SCHEDULE_EVENT_TYPE;
