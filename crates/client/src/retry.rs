use std::time::Duration;

use tokio_retry::RetryIf;

use crate::error::FetchError;

/// Retry the provided async operation exactly once after `backoff` if the
/// first failure is retryable. A second failure, retryable or not, is
/// surfaced as-is: no unbounded retry, no exponential backoff.
pub(crate) async fn retry_once<F, Fut, T>(backoff: Duration, op: F) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, FetchError>>,
{
    RetryIf::spawn(std::iter::once(backoff), op, FetchError::is_retryable).await
}
