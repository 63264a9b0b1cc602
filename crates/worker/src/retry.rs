//! Bounded retry with exponential backoff.

use pipeline_core::{Error, Result, RetryPolicy};
use std::future::Future;
use telemetry::metrics;
use tracing::warn;

/// Runs `operation` until it succeeds or `policy` runs out of attempts.
///
/// Permanent and fatal errors are returned at once without retrying. When
/// attempts run out the last error is wrapped in [`Error::RetryExhausted`].
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, name: &'static str, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.attempts();
    let mut attempt = 1;

    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_permanent() || e.is_fatal() => return Err(e),
            Err(e) => e,
        };

        if attempt >= max_attempts {
            return Err(Error::RetryExhausted {
                operation: name,
                attempts: attempt,
                source: Box::new(err),
            });
        }

        let backoff = policy.delay_after(attempt);
        warn!(
            operation = name,
            attempt = attempt,
            max_attempts = max_attempts,
            backoff_ms = %backoff.as_millis(),
            error = %err,
            "Retrying after failure"
        );
        metrics().retries.inc();

        if !backoff.is_zero() {
            tokio::time::sleep(backoff).await;
        }
        attempt += 1;
    }
}
