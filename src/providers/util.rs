use anyhow::Error;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Delay policy between retry attempts.
#[derive(Debug, Clone, Copy)]
pub enum Backoff {
    /// base, 2 × base, 4 × base, ...
    Exponential(Duration),
    /// base, 2 × base, 3 × base, ...
    Linear(Duration),
}

impl Backoff {
    /// Delay to sleep after the Nth failed attempt (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        match self {
            Backoff::Exponential(base) => {
                base.saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
            }
            Backoff::Linear(base) => base.saturating_mul(attempt.max(1)),
        }
    }
}

/// Retries an async operation with configurable attempts and delays
///
/// # Parameters
/// - `operation`: Closure returning a future
/// - `retries`: Number of retry attempts (total runs = 1 initial + retries)
/// - `backoff`: Delay policy between attempts
///
/// # Returns
/// Either the successful result or the error after all attempts
pub async fn with_retry<F, Fut, T>(
    mut operation: F,
    retries: u32,
    backoff: Backoff,
) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(val) => return Ok(val),
            Err(err) => {
                if attempt > retries {
                    return Err(err);
                }
                let delay = backoff.delay(attempt);
                debug!(
                    "Attempt {}/{} failed: {}. Retrying in {:?}...",
                    attempt,
                    retries + 1,
                    err,
                    delay
                );
                attempt += 1;
                tokio::time::sleep(delay).await;
            }
        }
    }
}
