use std::time::Duration;

/// Process-wide engine settings.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use remedy_engine::EngineConfig;
///
/// let config = EngineConfig::default();
/// assert_eq!(config.max_concurrent_actions, 5);
/// assert_eq!(config.default_cooldown, Duration::from_secs(300));
/// ```
#[derive(Debug, Clone)]
#[allow(clippy::struct_excessive_bools)]
pub struct EngineConfig {
    /// Number of long-lived workers draining the action queue.
    pub max_concurrent_actions: usize,
    /// Capacity of the action queue.
    pub queue_capacity: usize,
    /// Cooldown for rules that do not set their own.
    pub default_cooldown: Duration,
    /// Require approval for every action, regardless of the rule.
    pub require_approval: bool,
    /// Run every action as a dry run.
    pub dry_run: bool,
    /// Insert the built-in rules on start when no rule of that name exists.
    pub seed_builtin_rules: bool,
    /// How often schedule-triggered rules are checked.
    pub schedule_tick: Duration,
    /// Chat channel for approval prompts. `None` uses the notifier default.
    pub approval_channel: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_actions: 5,
            queue_capacity: 100,
            default_cooldown: Duration::from_secs(300),
            require_approval: false,
            dry_run: false,
            seed_builtin_rules: true,
            schedule_tick: Duration::from_secs(30),
            approval_channel: None,
        }
    }
}
