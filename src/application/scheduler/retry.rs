use crate::shared::error::is_transient_error;
use std::time::Duration;

/// Exponential backoff for transient failures.
///
/// Retry `n` (0-based) waits `base * 2^n`, capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    base: Duration,
    max: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base: Duration, max: Duration) -> Self {
        Self {
            max_retries,
            base,
            max,
        }
    }

    /// Never retries
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO, Duration::ZERO)
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.checked_pow(retry).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.max)
    }

    /// Whether a failure after `retries_so_far` retries should be tried again
    pub fn should_retry(&self, retries_so_far: u32, err: &anyhow::Error) -> bool {
        retries_so_far < self.max_retries && is_transient_error(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::error::RegistryError;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100), Duration::from_millis(500));
        assert_eq!(policy.backoff(0), Duration::from_millis(100));
        assert_eq!(policy.backoff(1), Duration::from_millis(200));
        assert_eq!(policy.backoff(2), Duration::from_millis(400));
        assert_eq!(policy.backoff(3), Duration::from_millis(500));
        assert_eq!(policy.backoff(40), Duration::from_millis(500));
    }

    #[test]
    fn test_only_transient_errors_are_retried() {
        let policy = RetryPolicy::new(2, Duration::from_millis(1), Duration::from_millis(1));
        let transient: anyhow::Error = RegistryError::SourceUnavailable {
            details: "timed out".to_string(),
        }
        .into();
        let permanent: anyhow::Error = RegistryError::InvalidInput {
            message: "bad record".to_string(),
        }
        .into();

        assert!(policy.should_retry(0, &transient));
        assert!(policy.should_retry(1, &transient));
        assert!(!policy.should_retry(2, &transient));
        assert!(!policy.should_retry(0, &permanent));
        assert!(!RetryPolicy::none().should_retry(0, &transient));
    }
}
