//! Retry policy for cached reads.

use reports_core::ReportsError;
use std::time::Duration;

/// Default delay before the first retry.
const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);

/// Upper bound on the delay between retries.
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

/// How many times, and how patiently, a failed read is retried.
///
/// Only transient failures ([`ReportsError::is_transient`]) are retried. The
/// delay doubles after every attempt, starting at `base_delay` and capped at
/// `max_delay`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Longest delay between two attempts.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(1)
    }
}

impl RetryPolicy {
    /// Creates a policy with the default backoff.
    #[must_use]
    pub const fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }

    /// A policy that never retries.
    #[must_use]
    pub const fn none() -> Self {
        Self::new(0)
    }

    /// Overrides the backoff delays.
    #[must_use]
    pub const fn with_backoff(mut self, base_delay: Duration, max_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self.max_delay = max_delay;
        self
    }

    /// Returns true if a request that failed with `err` on its
    /// `attempt`-th retry (zero-based) should be tried again.
    #[must_use]
    pub const fn should_retry(&self, attempt: u32, err: &ReportsError) -> bool {
        attempt < self.max_retries && err.is_transient()
    }

    /// Delay to wait before retry number `attempt` (zero-based).
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reports_core::FieldErrors;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::new(10);
        assert_eq!(policy.delay(0), Duration::from_secs(1));
        assert_eq!(policy.delay(1), Duration::from_secs(2));
        assert_eq!(policy.delay(3), Duration::from_secs(8));
        assert_eq!(policy.delay(5), Duration::from_secs(30));
        assert_eq!(policy.delay(40), Duration::from_secs(30));
    }

    #[test]
    fn test_only_transient_errors_are_retried() {
        let policy = RetryPolicy::new(2);
        let network = ReportsError::Network("connection reset".into());
        let server = ReportsError::Server {
            status: 500,
            message: "boom".into(),
            field_errors: FieldErrors::new(),
        };

        assert!(policy.should_retry(0, &network));
        assert!(policy.should_retry(1, &network));
        assert!(!policy.should_retry(2, &network));
        assert!(!policy.should_retry(0, &server));
        assert!(!RetryPolicy::none().should_retry(0, &network));
    }
}
