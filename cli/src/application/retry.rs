//! Exponential backoff around fallible async operations.

use std::future::Future;
use std::time::Duration;

use anyhow::Result;

/// Attempt budget and delay schedule for [`with_retry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base: Duration,
    pub max: Duration,
}

impl RetryPolicy {
    /// Registry port lookup after cluster creation.
    pub const REGISTRY_PORT: Self = Self {
        attempts: 5,
        base: Duration::from_millis(250),
        max: Duration::from_secs(2),
    };

    /// `kubectl apply` of the registry ConfigMap.
    pub const REGISTRY_ADVERTISE: Self = Self {
        attempts: 5,
        base: Duration::from_millis(500),
        max: Duration::from_secs(4),
    };

    /// A single attempt with no waiting.
    pub const ONCE: Self = Self {
        attempts: 1,
        base: Duration::ZERO,
        max: Duration::ZERO,
    };

    /// Delay slept after failed attempt number `attempt` (1-based):
    /// `min(base * 2^(attempt-1), max)`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base.saturating_mul(factor).min(self.max)
    }
}

/// Run `op` until it succeeds or the attempt budget is spent.
///
/// Every failure except the last is handed to `on_retry` before sleeping.
///
/// # Errors
///
/// Returns the last error produced by `op`.
pub async fn with_retry<T, F, Fut>(
    policy: RetryPolicy,
    on_retry: impl FnMut(u32, &anyhow::Error),
    op: F,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    with_retry_if(policy, |_| true, on_retry, op).await
}

/// Like [`with_retry`], but errors rejected by `retryable` end the loop at
/// once.
///
/// # Errors
///
/// Returns the first non-retryable error, or the last error once the budget
/// is spent.
pub async fn with_retry_if<T, F, Fut>(
    policy: RetryPolicy,
    retryable: impl Fn(&anyhow::Error) -> bool,
    mut on_retry: impl FnMut(u32, &anyhow::Error),
    mut op: F,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if attempt >= attempts || !retryable(&err) => return Err(err),
            Err(err) => {
                on_retry(attempt, &err);
                tokio::time::sleep(policy.delay_for(attempt)).await;
                attempt += 1;
            }
        }
    }
}
