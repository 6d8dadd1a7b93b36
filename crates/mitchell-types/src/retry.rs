//! Shared bounded-backoff retry helper used by every Reasoner backend.

use std::time::Duration;

use crate::{Error, ErrorKind};

/// Number of attempts `with_backoff` will make before giving up.
pub const MAX_ATTEMPTS: u32 = 3;

/// Base delay for the exponential backoff schedule: 2s, 4s, 8s.
const BASE_DELAY: Duration = Duration::from_secs(2);

/// Runs `attempt` up to [`MAX_ATTEMPTS`] times, retrying only while
/// `is_retryable` returns `true` for the returned error, and sleeping
/// `2 << n` seconds between attempts (2s, 4s, 8s). The first non-retryable
/// error, or the error from the final attempt, is returned as-is.
///
/// Grounded in the reference connection-retry idiom: retry with bounded
/// exponential backoff, `tracing::warn!` on every non-final attempt.
pub async fn with_backoff<T, F, Fut>(
    operation: &str,
    mut attempt: F,
    is_retryable: impl Fn(&Error) -> bool,
) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, Error>>,
{
    let mut last_err = None;

    for n in 0..MAX_ATTEMPTS {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(err) if is_retryable(&err) && n + 1 < MAX_ATTEMPTS => {
                let delay = BASE_DELAY * 2u32.pow(n);
                tracing::warn!(
                    operation,
                    attempt = n + 1,
                    max_attempts = MAX_ATTEMPTS,
                    delay_secs = delay.as_secs(),
                    error = %err,
                    "retrying after rate-limit backoff"
                );
                tokio::time::sleep(delay).await;
                last_err = Some(err);
            }
            Err(err) => {
                last_err = Some(err);
                break;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| Error::new(ErrorKind::Other, "retry loop exited with no error")))
}

/// Convenience retry predicate for Reasoner backends: retries only on
/// [`ErrorKind::ReasonerRateLimited`].
pub fn is_rate_limited(err: &Error) -> bool {
    err.kind() == ErrorKind::ReasonerRateLimited
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[tokio::test]
    async fn succeeds_without_retry_when_first_attempt_ok() {
        let calls = AtomicU32::new(0);
        let result = with_backoff(
            "test",
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, Error>(42) }
            },
            is_rate_limited,
        )
        .await
        .unwrap();

        assert_eq!(result, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stops_immediately_on_non_retryable_error() {
        let calls = AtomicU32::new(0);
        let result = with_backoff(
            "test",
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<u32, _>(Error::new(ErrorKind::ReasonerProtocolError, "bad shape")) }
            },
            is_rate_limited,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausts_all_attempts_on_persistent_rate_limit() {
        let calls = AtomicU32::new(0);
        let result = with_backoff(
            "test",
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<u32, _>(Error::new(ErrorKind::ReasonerRateLimited, "429")) }
            },
            is_rate_limited,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), MAX_ATTEMPTS);
    }
}
