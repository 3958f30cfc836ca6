use core::future::Future;

use crate::error::Error;

/// Run `op` up to `attempts` times, returning the first success or the last
/// error. Deliberately without backoff: transient submit failures (nonce
/// collisions, short reorgs) resolve quickly, while deterministic failures
/// should surface after a bounded number of tries instead of compounding.
pub async fn with_retry<T, Fut>(attempts: u32, mut op: impl FnMut() -> Fut) -> Result<T, Error>
where
    Fut: Future<Output = Result<T, Error>>,
{
    let mut last = match op().await {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };

    for _ in 1..attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => last = e,
        }
    }

    Err(last)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[tokio::test]
    async fn returns_first_success() {
        let calls = AtomicU32::new(0);

        let result = with_retry(3, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 1 {
                    Err(Error::aborted())
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn exhausts_attempts_and_returns_last_error() {
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = with_retry(3, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Error::aborted()) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
