use std::future::Future;
use std::time::Duration;

use log::warn;

use crate::error::AdapterError;

const INITIAL_BACKOFF: Duration = Duration::from_millis(500);
const MAX_BACKOFF: Duration = Duration::from_secs(15);
const MAX_ATTEMPTS: u32 = 5;
const BACKOFF_MULTIPLIER: u32 = 2;

/// Exponential back-off retry shared by every Chain Adapter operation (spec
/// §4.1): 500ms initial, x2 each attempt, capped at 15s, 5 attempts total.
/// Only `AdapterError::is_retryable` errors are retried; anything else (e.g.
/// `NotFound`, `Rejected`) is returned to the caller immediately.
pub async fn with_retry<T, F, Fut>(operation: &str, mut f: F) -> Result<T, AdapterError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AdapterError>>,
{
    let mut backoff = INITIAL_BACKOFF;
    let mut attempt = 0;
    loop {
        attempt += 1;
        match f().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < MAX_ATTEMPTS => {
                warn!(
                    "{operation} attempt {attempt}/{MAX_ATTEMPTS} failed: {err}, retrying in {backoff:?}"
                );
                tokio::time::sleep(backoff).await;
                backoff = (backoff * BACKOFF_MULTIPLIER).min(MAX_BACKOFF);
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_transient_errors_until_success() {
        let attempts = AtomicU32::new(0);
        let result = with_retry("test_op", || async {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(AdapterError::Transient("boom".into()))
            } else {
                Ok(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn does_not_retry_not_found() {
        let attempts = AtomicU32::new(0);
        let result: Result<(), AdapterError> = with_retry("test_op", || async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(AdapterError::NotFound)
        })
        .await;
        assert!(matches!(result, Err(AdapterError::NotFound)));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_five_attempts() {
        let attempts = AtomicU32::new(0);
        let result: Result<(), AdapterError> = with_retry("test_op", || async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(AdapterError::Transient("always fails".into()))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 5);
    }
}
