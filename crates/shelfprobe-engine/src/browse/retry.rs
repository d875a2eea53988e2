//! Backoff retries for transient browse failures.

use std::future::Future;
use std::time::Duration;

use crate::error::BrowseError;

/// Rate limiting and network-level failures are worth another try; anything
/// the server answered deliberately is not.
fn is_retriable(err: &BrowseError) -> bool {
    match err {
        BrowseError::RateLimited { .. } | BrowseError::Http(_) => true,
        BrowseError::UnexpectedStatus { status, .. } => matches!(status, 502 | 504),
        _ => false,
    }
}

/// Runs `operation`, sleeping `backoff_base_ms * 2^attempt` between attempts
/// on retriable errors, for at most `max_retries` extra attempts.
pub(super) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, BrowseError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BrowseError>>,
{
    let mut attempt = 0u32;
    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        if !is_retriable(&err) || attempt >= max_retries {
            return Err(err);
        }

        let delay_ms = backoff_base_ms.saturating_mul(1u64 << attempt.min(20));
        tracing::warn!(
            attempt,
            max_retries,
            delay_ms,
            error = %err,
            "transient browse error, retrying after backoff"
        );
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;

    fn rate_limited() -> BrowseError {
        BrowseError::RateLimited {
            url: "https://shop.example/".to_owned(),
            retry_after_secs: 0,
        }
    }

    #[tokio::test]
    async fn retries_rate_limit_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(3, 0, || {
            let c = Arc::clone(&c);
            async move {
                if c.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(rate_limited())
                } else {
                    Ok::<_, BrowseError>("page")
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), "page");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(1, 0, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(rate_limited())
            }
        })
        .await;
        assert!(matches!(result, Err(BrowseError::RateLimited { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn does_not_retry_client_errors() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(3, 0, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(BrowseError::UnexpectedStatus {
                    status: 404,
                    url: "https://shop.example/x".to_owned(),
                })
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
