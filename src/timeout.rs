//! Bounded Network Calls
//!
//! Every round trip to a shared backend (session store, remote vector
//! index, model API) goes through [`bounded`], so a stalled peer surfaces
//! as a [`TimeoutError`] instead of hanging a request.

use std::future::Future;
use std::time::{Duration, Instant};

/// Timeout error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{operation} exceeded timeout of {timeout:?} (ran for {elapsed:?})")]
pub struct TimeoutError {
    /// What was being attempted
    pub operation: &'static str,
    /// The timeout duration that was exceeded
    pub timeout: Duration,
    /// How long the call actually ran
    pub elapsed: Duration,
}

/// Run `fut` with an upper bound of `timeout`.
///
/// A zero duration disables the bound.
pub async fn bounded<F, T>(
    operation: &'static str,
    timeout: Duration,
    fut: F,
) -> Result<T, TimeoutError>
where
    F: Future<Output = T>,
{
    if timeout.is_zero() {
        return Ok(fut.await);
    }

    let start = Instant::now();
    match tokio::time::timeout(timeout, fut).await {
        Ok(value) => Ok(value),
        Err(_) => {
            let elapsed = start.elapsed();
            tracing::warn!(operation, ?timeout, ?elapsed, "backend call timed out");
            Err(TimeoutError {
                operation,
                timeout,
                elapsed,
            })
        }
    }
}
