use std::time::Duration;

use crate::retry::RetryStrategy;

/// Configuration for the [`StepExecutor`](crate::StepExecutor).
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use remedy_executor::ExecutorConfig;
///
/// let config = ExecutorConfig::default();
/// assert_eq!(config.step_timeout, Some(Duration::from_secs(120)));
/// assert_eq!(config.restart_grace_period, Duration::from_secs(30));
/// ```
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Delay between attempts of steps with the `retry` policy.
    pub retry_strategy: RetryStrategy,
    /// Upper bound on each cluster or notifier call. `None` disables it.
    pub step_timeout: Option<Duration>,
    /// Grace period for `restart_pod` and `drain` when the step sets none.
    pub restart_grace_period: Duration,
    /// Grace period for `delete` when the step sets none.
    pub delete_grace_period: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            retry_strategy: RetryStrategy::default(),
            step_timeout: Some(Duration::from_secs(120)),
            restart_grace_period: Duration::from_secs(30),
            delete_grace_period: Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = ExecutorConfig::default();
        assert_eq!(cfg.retry_strategy.delay_for(0), Duration::from_secs(1));
        assert_eq!(cfg.step_timeout, Some(Duration::from_secs(120)));
        assert_eq!(cfg.restart_grace_period, Duration::from_secs(30));
        assert_eq!(cfg.delete_grace_period, Duration::ZERO);
    }
}
