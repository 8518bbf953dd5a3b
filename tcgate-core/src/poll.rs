//! Poll - Retry-until-consistent combinators
//!
//! Cloud control planes are eventually consistent: a resource created a moment
//! ago may not be visible to the next read. `poll_until` repeats a check at a
//! fixed interval until it reports success, a non-retryable error occurs, or
//! the overall time budget runs out.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::provider::ProviderError;

/// Errors that know whether another attempt may succeed
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Interval and overall budget of a polling loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollPolicy {
    pub const fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    /// Budget for "is it visible yet" loops
    pub const fn read() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(3 * 60))
    }

    /// Budget for mutating calls, which take longer to propagate
    pub const fn write() -> Self {
        Self::new(Duration::from_secs(2), Duration::from_secs(5 * 60))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PollError<E> {
    #[error(
        "timed out after {}s waiting for {what}{}",
        .elapsed.as_secs(),
        last_error_suffix(.last_error)
    )]
    Timeout {
        what: String,
        elapsed: Duration,
        last_error: Option<String>,
    },

    #[error("{0}")]
    Failed(#[source] E),
}

fn last_error_suffix(last_error: &Option<String>) -> String {
    match last_error {
        Some(e) => format!(" (last error: {})", e),
        None => String::new(),
    }
}

impl<E> PollError<E> {
    pub fn is_timeout(&self) -> bool {
        matches!(self, PollError::Timeout { .. })
    }
}

impl<E> From<PollError<E>> for ProviderError
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(err: PollError<E>) -> Self {
        match err {
            PollError::Failed(e) => ProviderError::from_error(e),
            timeout @ PollError::Timeout { .. } => ProviderError::new(timeout.to_string()),
        }
    }
}

/// Repeat `check` until it yields `Some`.
///
/// `Ok(None)` means "not yet" and retryable errors are remembered and retried.
/// A non-retryable error ends the loop immediately.
pub async fn poll_until<T, E, F, Fut>(
    what: &str,
    policy: PollPolicy,
    mut check: F,
) -> Result<T, PollError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
    E: Retryable + std::fmt::Display,
{
    let start = Instant::now();
    let mut attempt: u32 = 0;
    let mut last_error = None;

    loop {
        attempt += 1;
        match check().await {
            Ok(Some(value)) => {
                log::debug!("{} ready after {} attempt(s)", what, attempt);
                return Ok(value);
            }
            Ok(None) => {
                log::debug!("{} not ready yet (attempt {})", what, attempt);
            }
            Err(e) if e.is_retryable() => {
                log::warn!("{}: retryable error on attempt {}: {}", what, attempt, e);
                last_error = Some(e.to_string());
            }
            Err(e) => return Err(PollError::Failed(e)),
        }

        let elapsed = start.elapsed();
        if elapsed >= policy.timeout {
            return Err(PollError::Timeout {
                what: what.to_string(),
                elapsed,
                last_error,
            });
        }
        tokio::time::sleep(policy.interval.min(policy.timeout - elapsed)).await;
    }
}

/// Run `op` until it succeeds, retrying retryable errors within the budget
pub async fn retry<T, E, F, Fut>(what: &str, policy: PollPolicy, mut op: F) -> Result<T, PollError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + std::fmt::Display,
{
    poll_until(what, policy, || {
        let fut = op();
        async move { fut.await.map(Some) }
    })
    .await
}
