//! Retry policy shared by every engine call.

use std::time::Duration;

/// Exponential backoff: attempt `n` (0-based) waits `base_delay * multiplier^n`
/// before attempt `n + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    max_attempts: u32,
    base_delay: Duration,
    multiplier: u32,
}

impl BackoffPolicy {
    pub const DEFAULT_MULTIPLIER: u32 = 2;

    /// Creates a doubling policy. At least one attempt is always made.
    #[must_use]
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            multiplier: Self::DEFAULT_MULTIPLIER,
        }
    }

    /// A policy that retries without sleeping.
    #[must_use]
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO)
    }

    #[must_use]
    pub fn with_multiplier(mut self, multiplier: u32) -> Self {
        self.multiplier = multiplier;
        self
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay after the failed attempt `attempt` (0-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(self.multiplier.saturating_pow(attempt))
    }

    /// Whether another attempt follows attempt `attempt` (0-based).
    #[must_use]
    pub fn has_attempt_after(&self, attempt: u32) -> bool {
        attempt.saturating_add(1) < self.max_attempts
    }

    /// Sleeps for [`delay_for`](Self::delay_for) on the tokio timer.
    pub async fn wait(&self, attempt: u32) {
        let delay = self.delay_for(attempt);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_double() {
        let policy = BackoffPolicy::new(4, Duration::from_millis(100));
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(400));
    }

    #[test]
    fn custom_multiplier() {
        let policy = BackoffPolicy::new(3, Duration::from_millis(10)).with_multiplier(3);
        assert_eq!(policy.delay_for(2), Duration::from_millis(90));
    }

    #[test]
    fn attempts_are_bounded() {
        let policy = BackoffPolicy::new(3, Duration::ZERO);
        assert!(policy.has_attempt_after(0));
        assert!(policy.has_attempt_after(1));
        assert!(!policy.has_attempt_after(2));
        assert_eq!(BackoffPolicy::immediate(0).max_attempts(), 1);
    }

    #[test]
    fn huge_attempts_saturate() {
        let policy = BackoffPolicy::new(100, Duration::from_secs(1));
        assert_eq!(
            policy.delay_for(64),
            Duration::from_secs(u64::from(u32::MAX))
        );
    }

    #[tokio::test]
    async fn immediate_policy_does_not_sleep() {
        let started = std::time::Instant::now();
        BackoffPolicy::immediate(5).wait(3).await;
        assert!(started.elapsed() < Duration::from_millis(50));
    }
}
