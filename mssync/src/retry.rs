use std::time::Duration;

use tracing::warn;

use crate::error::{ErrorClass, SyncResult};

/// Maximum number of retries after the initial attempt.
pub const MAX_RETRIES: u32 = 3;

/// Runs a database operation, retrying transient failures in place.
///
/// Backoff is exponential: 2, 4 and 8 seconds before the second, third and
/// fourth attempt. Anything that is not classified transient — schema
/// mismatches in particular — propagates on the first occurrence.
pub async fn with_retries<T, F>(operation: &str, mut op: F) -> SyncResult<T>
where
    F: AsyncFnMut() -> SyncResult<T>,
{
    let mut attempt = 0u32;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < MAX_RETRIES && err.class() == ErrorClass::Transient => {
                attempt += 1;
                let backoff = Duration::from_secs(1u64 << attempt);
                warn!(
                    operation,
                    attempt,
                    backoff_secs = backoff.as_secs(),
                    error = %err,
                    "transient database error, retrying"
                );
                tokio::time::sleep(backoff).await;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::sync_error;

    #[tokio::test(start_paused = true)]
    async fn success_passes_through_untouched() {
        let mut calls = 0u32;
        let result = with_retries("op", async || {
            calls += 1;
            Ok(42)
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_error_is_seen_at_most_four_times() {
        let mut calls = 0u32;
        let result: SyncResult<()> = with_retries("op", async || {
            calls += 1;
            Err(sync_error!(ErrorKind::ServiceBusy, "busy"))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls, MAX_RETRIES + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_error_recovers_mid_retry() {
        let mut calls = 0u32;
        let result = with_retries("op", async || {
            calls += 1;
            if calls < 3 {
                Err(sync_error!(ErrorKind::ConnectionLost, "dropped"))
            } else {
                Ok("recovered")
            }
        })
        .await;
        assert_eq!(result.unwrap(), "recovered");
        assert_eq!(calls, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn schema_error_is_seen_exactly_once() {
        let mut calls = 0u32;
        let result: SyncResult<()> = with_retries("op", async || {
            calls += 1;
            Err(sync_error!(ErrorKind::InvalidColumn, "bad column"))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_error_is_not_retried() {
        let mut calls = 0u32;
        let result: SyncResult<()> = with_retries("op", async || {
            calls += 1;
            Err(sync_error!(ErrorKind::QueryFailed, "boom"))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }
}
