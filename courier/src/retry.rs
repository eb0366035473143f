//! Bounded retry with exponential backoff for transient store errors.

use std::future::Future;
use std::time::Duration;

use courier_core::Result;
use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(20),
            max_backoff: Duration::from_secs(1),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }
}

/// Runs `f` until it succeeds, fails with a non-transient error, or retries are used up.
/// The last error is returned unchanged.
pub async fn with_retry<F, Fut, T>(policy: &RetryPolicy, op: &str, mut f: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    let mut backoff = policy.initial_backoff;

    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < policy.max_retries => {
                attempt += 1;
                warn!(
                    op,
                    attempt,
                    max_retries = policy.max_retries,
                    error = %err,
                    "Transient failure, retrying in {:?}",
                    backoff
                );
                tokio::time::sleep(backoff).await;

                backoff = Duration::from_millis(
                    ((backoff.as_millis() as f64 * policy.backoff_multiplier)
                        .min(policy.max_backoff.as_millis() as f64)) as u64,
                );
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::CourierError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            initial_backoff: Duration::from_millis(1),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();

        let result = with_retry(&fast(), "op", move || {
            c.fetch_add(1, Ordering::SeqCst);
            async { Ok(42) }
        })
        .await;

        assert_eq!(result, Ok(42));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();

        let result = with_retry(&fast(), "op", move || {
            let count = c.fetch_add(1, Ordering::SeqCst);
            async move {
                if count < 2 {
                    Err(CourierError::Busy("locked".to_string()))
                } else {
                    Ok(7)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(7));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();

        let result: Result<()> = with_retry(&fast(), "op", move || {
            c.fetch_add(1, Ordering::SeqCst);
            async { Err(CourierError::ConflictOnCleanup("racing writer".to_string())) }
        })
        .await;

        assert_eq!(result.unwrap_err().code(), "conflict_on_cleanup");
        assert_eq!(counter.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();

        let result: Result<()> = with_retry(&fast(), "op", move || {
            c.fetch_add(1, Ordering::SeqCst);
            async { Err(CourierError::NotFound("message 1".to_string())) }
        })
        .await;

        assert!(matches!(result, Err(CourierError::NotFound(_))));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
