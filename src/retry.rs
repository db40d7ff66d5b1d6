//! Bounded retries with exponential backoff for external calls.

use std::time::Duration;

use tracing::warn;

use crate::config::RetryPolicy;
use crate::error::{Result, ScenicError};

impl RetryPolicy {
    /// Delay before attempt `attempt + 1` (attempts are 1-based).
    pub fn backoff(&self, attempt: u32, err: &ScenicError) -> Duration {
        let (base_ms, hinted) = match err {
            ScenicError::RateLimited { retry_after } => (self.rate_limit_delay_ms, *retry_after),
            _ => (self.base_delay_ms, None),
        };
        let exp = attempt.saturating_sub(1).min(16);
        let delay_ms = base_ms.saturating_mul(1u64 << exp).min(self.max_delay_ms);
        let delay = Duration::from_millis(delay_ms);
        match hinted {
            Some(hint) => hint.max(delay),
            None => delay,
        }
    }
}

/// Runs `op` until it succeeds, fails with a non-retryable error, or the
/// policy's attempts are used up. The last error is returned.
pub fn with_retry<T, F>(policy: &RetryPolicy, what: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < max_attempts => {
                let delay = policy.backoff(attempt, &err);
                warn!(
                    what,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "retrying external call"
                );
                std::thread::sleep(delay);
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay_ms: 1,
            rate_limit_delay_ms: 2,
            max_delay_ms: 5,
        }
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay_ms: 100,
            rate_limit_delay_ms: 1000,
            max_delay_ms: 1500,
        };
        let transient = ScenicError::TransientNetwork("reset".into());
        assert_eq!(policy.backoff(1, &transient), Duration::from_millis(100));
        assert_eq!(policy.backoff(2, &transient), Duration::from_millis(200));
        assert_eq!(policy.backoff(3, &transient), Duration::from_millis(400));

        let limited = ScenicError::RateLimited { retry_after: None };
        assert_eq!(policy.backoff(1, &limited), Duration::from_millis(1000));
        assert_eq!(policy.backoff(2, &limited), Duration::from_millis(1500));

        let hinted = ScenicError::RateLimited {
            retry_after: Some(Duration::from_secs(3)),
        };
        assert_eq!(policy.backoff(1, &hinted), Duration::from_secs(3));
    }

    #[test]
    fn test_retries_transient_until_success() {
        let mut calls = 0;
        let value = with_retry(&fast_policy(), "test", || {
            calls += 1;
            if calls < 3 {
                Err(ScenicError::TransientNetwork("timeout".into()))
            } else {
                Ok(42)
            }
        })
        .unwrap();
        assert_eq!(value, 42);
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_gives_up_after_budget() {
        let mut calls = 0;
        let result: Result<()> = with_retry(&fast_policy(), "test", || {
            calls += 1;
            Err(ScenicError::RateLimited { retry_after: None })
        });
        assert!(matches!(result, Err(ScenicError::RateLimited { .. })));
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_data_errors_are_not_retried() {
        let mut calls = 0;
        let result: Result<()> = with_retry(&fast_policy(), "test", || {
            calls += 1;
            Err(ScenicError::data("empty"))
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }
}
