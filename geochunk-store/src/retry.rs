//! Retrying fallible async operations with a fixed delay between attempts.
//!
//! ```rust,no_run
//! use geochunk_store::retry::{RetryPolicy, retry};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), std::io::Error> {
//! let policy = RetryPolicy::new(5, Duration::from_millis(1000)).with_logging(true);
//! // executed up to 6 times before the last error is returned
//! let value = retry(&policy, || async { Ok::<_, std::io::Error>(42) }).await?;
//! # Ok(())
//! # }
//! ```

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

/// How often and how fast a failed operation is retried
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Number of retries after the first attempt
    pub retries: u32,
    /// Delay before each retry
    pub interval: Duration,
    /// Log every retried failure
    pub log_failures: bool,
}

impl RetryPolicy {
    pub fn new(retries: u32, interval: Duration) -> Self {
        Self {
            retries,
            interval,
            log_failures: false,
        }
    }

    /// A policy that fails on the first error
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub fn with_logging(mut self, log_failures: bool) -> Self {
        self.log_failures = log_failures;
        self
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_millis(1000))
    }
}

/// Run `operation` until it succeeds or `policy.retries` retries have failed.
///
/// Every failure is retried regardless of its cause. The error of the final
/// attempt is returned unchanged.
pub async fn retry<T, E, F, Fut>(policy: &RetryPolicy, operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    retry_if(policy, operation, |_| true).await
}

/// Like [`retry`], but errors for which `should_retry` returns `false` are
/// returned immediately.
pub async fn retry_if<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    mut operation: F,
    should_retry: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
    P: Fn(&E) -> bool,
{
    let mut attempt: u32 = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                attempt += 1;
                if attempt > policy.retries || !should_retry(&e) {
                    return Err(e);
                }
                if policy.log_failures {
                    warn!("Operation failed: {e}");
                    info!(
                        "Retry {} in {} milliseconds",
                        attempt,
                        policy.interval.as_millis()
                    );
                }
                tokio::time::sleep(policy.interval).await;
            }
        }
    }
}
