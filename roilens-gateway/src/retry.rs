//! Exponential-backoff retry wrapper for remote provider calls.
//!
//! Only rate-limit-shaped failures are retried; anything else propagates
//! unchanged so callers never see a masked error.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use roilens_core::config::RetrySettings;
use tracing::warn;

use crate::providers::ProviderError;

/// Extra seconds added on top of a server-suggested wait time.
const SUGGESTED_WAIT_MARGIN: Duration = Duration::from_secs(2);

static WAIT_SECONDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+)\s*seconds").expect("invalid wait-time regex"));

/// Errors produced by [`RetryPolicy::execute`]
#[derive(Debug, thiserror::Error)]
pub enum RetryError {
    /// Every attempt was rate-limited and the retry budget ran out.
    #[error("rate limited after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last_error: ProviderError,
    },

    /// The operation failed with a non-retryable error.
    #[error(transparent)]
    Operation(ProviderError),
}

/// Retry policy: exponential backoff on rate-limit errors.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetrySettings::default())
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            initial_delay: Duration::from_millis(settings.initial_delay_ms),
            backoff_factor: settings.backoff_factor,
        }
    }
}

impl RetryPolicy {
    /// Run `operation`, retrying rate-limited failures with backoff.
    ///
    /// When the error text carries a server-suggested wait time
    /// ("retry in 30 seconds"), that wait plus a small margin is used instead
    /// of the exponential delay. After `max_retries + 1` rate-limited
    /// attempts the call fails with [`RetryError::RetriesExhausted`].
    pub async fn execute<T, F, Fut>(&self, mut operation: F) -> Result<T, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut delay = self.initial_delay;
        let mut attempt: u32 = 0;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    let message = error.to_string();
                    if !is_rate_limited(&message) {
                        return Err(RetryError::Operation(error));
                    }
                    if attempt >= self.max_retries {
                        return Err(RetryError::RetriesExhausted {
                            attempts: attempt + 1,
                            last_error: error,
                        });
                    }

                    let wait = suggested_wait(&message)
                        .map(|suggested| suggested + SUGGESTED_WAIT_MARGIN)
                        .unwrap_or(delay);
                    warn!(
                        "Rate limited (attempt {}/{}), waiting {:?}: {}",
                        attempt + 1,
                        self.max_retries + 1,
                        wait,
                        message
                    );

                    tokio::time::sleep(wait).await;
                    delay = delay.mul_f64(self.backoff_factor);
                    attempt += 1;
                }
            }
        }
    }
}

/// Whether an error message looks like a rate-limit rejection.
pub fn is_rate_limited(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("rate limit") || lower.contains("too many requests")
}

/// Parse a server-suggested wait time ("retry in 30 seconds") from an error message.
fn suggested_wait(message: &str) -> Option<Duration> {
    WAIT_SECONDS
        .captures(message)?
        .get(1)?
        .as_str()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn rate_limit_error() -> ProviderError {
        ProviderError::ApiError {
            message: "429 Too Many Requests: rate limit exceeded".to_string(),
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            backoff_factor: 2.0,
        }
    }

    #[test]
    fn detects_rate_limit_phrases_case_insensitively() {
        assert!(is_rate_limited("Rate Limit exceeded"));
        assert!(is_rate_limited("HTTP 429: TOO MANY REQUESTS"));
        assert!(!is_rate_limited("HTTP 500: internal server error"));
    }

    #[test]
    fn parses_suggested_wait_seconds() {
        assert_eq!(
            suggested_wait("Please retry after 30 seconds."),
            Some(Duration::from_secs(30))
        );
        assert_eq!(suggested_wait("try again later"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_two_rate_limited_attempts() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&attempts);

        let start = tokio::time::Instant::now();
        let result = policy()
            .execute(|| {
                let counter = Arc::clone(&counter);
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(rate_limit_error())
                    } else {
                        Ok(42)
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(result, 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        // Two backoff sleeps: 1s then 2s.
        assert!(start.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn non_rate_limit_error_propagates_without_retry() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&attempts);

        let result: Result<u32, RetryError> = policy()
            .execute(|| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(ProviderError::ApiError {
                        message: "HTTP 500: boom".to_string(),
                    })
                }
            })
            .await;

        assert!(matches!(result, Err(RetryError::Operation(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_retries_when_always_rate_limited() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&attempts);

        let result: Result<u32, RetryError> = policy()
            .execute(|| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(rate_limit_error())
                }
            })
            .await;

        match result {
            Err(RetryError::RetriesExhausted { attempts: n, .. }) => assert_eq!(n, 4),
            other => panic!("expected RetriesExhausted, got {:?}", other.map(|_| ())),
        }
        // max_retries + 1 total attempts
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn server_suggested_wait_overrides_backoff() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&attempts);

        let start = tokio::time::Instant::now();
        let result = policy()
            .execute(|| {
                let counter = Arc::clone(&counter);
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(ProviderError::ApiError {
                            message: "rate limit: retry after 30 seconds".to_string(),
                        })
                    } else {
                        Ok("ok")
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(result, "ok");
        // 30 suggested + 2 margin
        assert!(start.elapsed() >= Duration::from_secs(32));
    }
}
