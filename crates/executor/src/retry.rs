use std::time::Duration;

/// Delay between attempts of a step whose failure policy is `retry`.
///
/// Every variant clamps the computed delay to its maximum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryStrategy {
    /// `delay * (attempt + 1)`, clamped to `max`.
    Linear {
        /// Per-attempt increment.
        delay: Duration,
        /// Upper bound on the computed delay.
        max: Duration,
    },
    /// The same delay before every attempt.
    Constant { delay: Duration },
}

impl RetryStrategy {
    /// Linear backoff with the given base and no ceiling.
    pub fn linear(delay: Duration) -> Self {
        Self::Linear {
            delay,
            max: Duration::MAX,
        }
    }

    /// Delay to wait after the zero-based `attempt` failed.
    ///
    /// ```
    /// use std::time::Duration;
    /// use remedy_executor::RetryStrategy;
    ///
    /// let strategy = RetryStrategy::linear(Duration::from_secs(1));
    /// assert_eq!(strategy.delay_for(0), Duration::from_secs(1));
    /// assert_eq!(strategy.delay_for(2), Duration::from_secs(3));
    /// assert_eq!(strategy.delay_for(119), Duration::from_secs(120));
    /// ```
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self {
            Self::Linear { delay, max } => delay
                .checked_mul(attempt.saturating_add(1))
                .map_or(*max, |d| d.min(*max)),
            Self::Constant { delay } => *delay,
        }
    }
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self::linear(Duration::from_secs(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_grows_per_attempt() {
        let strategy = RetryStrategy::Linear {
            delay: Duration::from_millis(500),
            max: Duration::from_secs(5),
        };
        assert_eq!(strategy.delay_for(0), Duration::from_millis(500));
        assert_eq!(strategy.delay_for(1), Duration::from_secs(1));
        assert_eq!(strategy.delay_for(4), Duration::from_millis(2500));
    }

    #[test]
    fn linear_clamped() {
        let strategy = RetryStrategy::Linear {
            delay: Duration::from_secs(2),
            max: Duration::from_secs(5),
        };
        assert_eq!(strategy.delay_for(2), Duration::from_secs(5));
        assert_eq!(strategy.delay_for(u32::MAX), Duration::from_secs(5));
    }

    #[test]
    fn constant_always_same() {
        let strategy = RetryStrategy::Constant {
            delay: Duration::from_millis(250),
        };
        for attempt in 0..10 {
            assert_eq!(strategy.delay_for(attempt), Duration::from_millis(250));
        }
    }

    #[test]
    fn default_is_linear_one_second() {
        assert_eq!(
            RetryStrategy::default(),
            RetryStrategy::Linear {
                delay: Duration::from_secs(1),
                max: Duration::MAX,
            }
        );
    }

    #[test]
    fn default_keeps_growing_past_a_minute() {
        let strategy = RetryStrategy::default();
        assert_eq!(strategy.delay_for(59), Duration::from_secs(60));
        assert_eq!(strategy.delay_for(60), Duration::from_secs(61));
        assert_eq!(strategy.delay_for(99), Duration::from_secs(100));
        assert_eq!(strategy.delay_for(u32::MAX), Duration::from_secs(u64::from(u32::MAX)));
    }
}
