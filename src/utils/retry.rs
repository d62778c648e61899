//! Retry utilities for resilient operations
//!
//! This module provides the retry loop used around provider calls. Attempts
//! are separated by a fixed delay; the first attempt never waits.

use std::fmt;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::GenerationConfig;

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total number of attempts, including the first one
    pub max_attempts: u32,

    /// Pause before every attempt after the first
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::from(&GenerationConfig::default())
    }
}

impl RetryConfig {
    /// Fixed-delay policy
    pub fn fixed(max_attempts: u32, delay_ms: u64) -> Self {
        Self {
            max_attempts,
            delay: Duration::from_millis(delay_ms),
        }
    }

    /// Delay slept before `attempt` (1-based)
    fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            Duration::ZERO
        } else {
            self.delay
        }
    }
}

impl From<&GenerationConfig> for RetryConfig {
    fn from(config: &GenerationConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            delay: config.retry_delay(),
        }
    }
}

/// All attempts failed
#[derive(Debug)]
pub struct RetryExhausted<E> {
    /// Attempts actually made
    pub attempts: u32,

    /// Error returned by the final attempt
    pub last_error: E,
}

impl<E: fmt::Display> fmt::Display for RetryExhausted<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed after {} attempts: {}",
            self.attempts, self.last_error
        )
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for RetryExhausted<E> {}

/// Execute an operation with retry logic
///
/// The operation receives the 1-based attempt number. At least one attempt
/// is always made, even when `max_attempts` is zero.
///
/// # Example
///
/// ```no_run
/// use apuntes::utils::retry::{with_retry, RetryConfig};
///
/// # async fn run() {
/// let config = RetryConfig::fixed(3, 2000);
/// let result = with_retry(&config, |_attempt| async {
///     Ok::<_, std::io::Error>("data")
/// })
/// .await;
/// assert!(result.is_ok());
/// # }
/// ```
pub async fn with_retry<T, E, F, Fut>(
    config: &RetryConfig,
    mut operation: F,
) -> Result<T, RetryExhausted<E>>
where
    E: fmt::Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        let delay = config.delay_before(attempt);
        if !delay.is_zero() {
            debug!(
                attempt = attempt,
                delay_ms = delay.as_millis() as u64,
                "Retrying operation after delay"
            );
            tokio::time::sleep(delay).await;
        }

        match operation(attempt).await {
            Ok(result) => {
                if attempt > 1 {
                    debug!(attempt = attempt, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) => {
                warn!(
                    attempt = attempt,
                    max_attempts = max_attempts,
                    error = %e,
                    "Operation failed"
                );

                if attempt >= max_attempts {
                    return Err(RetryExhausted {
                        attempts: attempt,
                        last_error: e,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_retry_success_first_attempt() {
        let config = RetryConfig::fixed(3, 0);
        let result = with_retry(&config, |_| async { Ok::<_, String>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_retry_success_after_failures() {
        let config = RetryConfig::fixed(3, 0);
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = Arc::clone(&attempts);

        let result = with_retry(&config, move |_| {
            let attempts = Arc::clone(&attempts_clone);
            async move {
                let count = attempts.fetch_add(1, Ordering::SeqCst);
                if count < 2 {
                    return Err("Simulated failure".to_string());
                }
                Ok(42)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_exhausted_reports_last_error() {
        let config = RetryConfig::fixed(2, 0);
        let result: Result<(), _> =
            with_retry(&config, |attempt| async move { Err(format!("failure {attempt}")) }).await;

        let err = result.unwrap_err();
        assert_eq!(err.attempts, 2);
        assert_eq!(err.last_error, "failure 2");
        assert!(err.to_string().contains("after 2 attempts"));
    }

    #[tokio::test]
    async fn test_zero_attempts_still_runs_once() {
        let config = RetryConfig::fixed(0, 0);
        let result: Result<(), _> = with_retry(&config, |_| async { Err("nope") }).await;
        assert_eq!(result.unwrap_err().attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fixed_delay_between_attempts_only() {
        let config = RetryConfig::fixed(3, 2000);
        let start = tokio::time::Instant::now();

        let result: Result<(), _> = with_retry(&config, |_| async { Err("nope") }).await;

        assert!(result.is_err());
        assert_eq!(start.elapsed(), Duration::from_millis(4000));
    }

    #[test]
    fn test_delay_before_attempts() {
        let config = RetryConfig::fixed(3, 2000);

        assert_eq!(config.delay_before(1), Duration::ZERO);
        assert_eq!(config.delay_before(2), Duration::from_millis(2000));
        assert_eq!(config.delay_before(3), Duration::from_millis(2000));
    }

    #[test]
    fn test_from_generation_config() {
        let generation = GenerationConfig {
            max_attempts: 5,
            retry_delay_ms: 750,
            ..GenerationConfig::default()
        };

        let config = RetryConfig::from(&generation);
        assert_eq!(config, RetryConfig::fixed(5, 750));
        assert_eq!(config.delay, generation.retry_delay());
        assert_eq!(RetryConfig::default(), RetryConfig::fixed(3, 2000));
    }
}
