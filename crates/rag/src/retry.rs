//! Retry with exponential backoff for transient generation failures.

use std::time::{Duration, Instant};

/// Configuration for retry behavior.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryConfig {
    /// Retries after the first attempt. Zero disables retrying.
    pub max_retries: u32,
    /// Base delay between retries (exponentially increased).
    pub base_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Whether to add random jitter to delays.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(10),
            jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn with_max_retries(mut self, max: u32) -> Self {
        self.max_retries = max;
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }
}

/// Result of a retry operation.
#[derive(Debug, Clone)]
pub struct RetryResult<T, E> {
    /// The final result: the first success, or the last error.
    pub result: Result<T, E>,
    /// Number of attempts made (1 = no retries needed).
    pub attempts: u32,
    /// Total duration spent on all attempts.
    pub total_duration: Duration,
}

impl<T, E> RetryResult<T, E> {
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }

    pub fn into_result(self) -> Result<T, E> {
        self.result
    }
}

/// Run `operation` until it succeeds, fails with an error `retryable`
/// rejects, or the retry budget is spent.
pub fn execute_with_retry<T, E, F, R>(config: &RetryConfig, retryable: R, mut operation: F) -> RetryResult<T, E>
where
    F: FnMut(u32) -> Result<T, E>,
    R: Fn(&E) -> bool,
{
    let start = Instant::now();
    let mut attempt = 0;

    loop {
        match operation(attempt) {
            Ok(value) => {
                return RetryResult {
                    result: Ok(value),
                    attempts: attempt + 1,
                    total_duration: start.elapsed(),
                }
            }
            Err(error) if attempt < config.max_retries && retryable(&error) => {
                std::thread::sleep(calculate_delay(config, attempt));
                attempt += 1;
            }
            Err(error) => {
                return RetryResult {
                    result: Err(error),
                    attempts: attempt + 1,
                    total_duration: start.elapsed(),
                }
            }
        }
    }
}

/// Calculate delay for a retry attempt with exponential backoff.
fn calculate_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let base = config.base_delay.as_millis() as u64;
    let exponential = base.saturating_mul(2_u64.saturating_pow(attempt));
    let delay = exponential.min(config.max_delay.as_millis() as u64);

    if config.jitter {
        // Add 0-50% random jitter
        let jitter = fastrand::u64(0..=delay / 2);
        Duration::from_millis(delay + jitter)
    } else {
        Duration::from_millis(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast() -> RetryConfig {
        RetryConfig::default()
            .with_base_delay(Duration::from_millis(1))
            .with_jitter(false)
    }

    #[test]
    fn default_does_not_retry() {
        let mut calls = 0;
        let result: RetryResult<(), &str> = execute_with_retry(&RetryConfig::default(), |_| true, |_| {
            calls += 1;
            Err("down")
        });
        assert_eq!(calls, 1);
        assert_eq!(result.attempts, 1);
        assert!(!result.succeeded());
    }

    #[test]
    fn retry_succeeds_eventually() {
        let mut counter = 0;
        let result = execute_with_retry(&fast().with_max_retries(3), |_| true, |_| {
            counter += 1;
            if counter < 3 {
                Err("not yet")
            } else {
                Ok("success")
            }
        });
        assert!(result.succeeded());
        assert_eq!(result.attempts, 3);
        assert_eq!(result.into_result().unwrap(), "success");
    }

    #[test]
    fn permanent_errors_stop_immediately() {
        let result: RetryResult<(), &str> =
            execute_with_retry(&fast().with_max_retries(5), |e| *e != "fatal", |_| Err("fatal"));
        assert_eq!(result.attempts, 1);
    }

    #[test]
    fn retry_fails_after_max_attempts() {
        let result: RetryResult<(), &str> =
            execute_with_retry(&fast().with_max_retries(2), |_| true, |_| Err("always fails"));
        assert_eq!(result.attempts, 3);
        assert_eq!(result.into_result(), Err("always fails"));
    }

    #[test]
    fn delay_is_capped() {
        let config = fast()
            .with_base_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_millis(300));
        assert_eq!(calculate_delay(&config, 0), Duration::from_millis(100));
        assert_eq!(calculate_delay(&config, 1), Duration::from_millis(200));
        assert_eq!(calculate_delay(&config, 5), Duration::from_millis(300));
        assert_eq!(calculate_delay(&config, 80), Duration::from_millis(300));
    }
}
