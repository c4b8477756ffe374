//! Restart backoff for a failing recognizer

use std::time::Duration;

/// Growth factor between consecutive restart delays (1.5x)
const BACKOFF_NUMERATOR: u128 = 3;
const BACKOFF_DENOMINATOR: u128 = 2;

/// Retry policy for recoverable recognizer failures
///
/// Controls how many restarts a failure streak may use and how long to wait
/// between them. Delays grow by 1.5x per attempt; there is no jitter so the
/// schedule is reproducible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Restarts allowed per failure streak before the engine stops
    pub max_retries: u32,
    /// Delay before the first restart
    pub base_delay: Duration,
    /// Maximum delay cap
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Delay before restart number `attempt` (zero-based) of a streak
    ///
    /// `min(base_delay * 1.5^attempt, max_delay)`
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let max = self.max_delay.as_nanos();
        let mut nanos = self.base_delay.as_nanos();
        if nanos == 0 {
            return Duration::ZERO;
        }

        for _ in 0..attempt {
            if nanos >= max {
                break;
            }
            nanos = nanos * BACKOFF_NUMERATOR / BACKOFF_DENOMINATOR;
        }

        if nanos >= max {
            return self.max_delay;
        }
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }

    /// Whether another restart is allowed after `retries` in this streak
    #[must_use]
    pub const fn allows(&self, retries: u32) -> bool {
        retries < self.max_retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_growth() {
        let policy = RetryPolicy {
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(60),
            ..RetryPolicy::default()
        };

        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(150));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(225));
    }

    #[test]
    fn delay_capped_at_max() {
        let policy = RetryPolicy {
            base_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(15),
            ..RetryPolicy::default()
        };

        // 10s * 1.5^3 = 33.75s, capped at 15s
        assert_eq!(policy.delay_for_attempt(3), policy.max_delay);
        assert_eq!(policy.delay_for_attempt(u32::MAX), policy.max_delay);
    }

    #[test]
    fn retry_cap() {
        let policy = RetryPolicy::default();
        assert!(policy.allows(0));
        assert!(policy.allows(4));
        assert!(!policy.allows(5));
    }

    #[test]
    fn default_policy_values() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.base_delay, Duration::from_millis(1000));
        assert_eq!(policy.max_delay, Duration::from_secs(10));
    }
}
