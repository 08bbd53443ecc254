//! Timeout wrapper for suspension points of a run
//!
//! Rendering and store I/O may block for a long time; every such call goes
//! through `with_step_timeout` so a hung browser or store turns into an
//! ordinary (retryable) error instead of a stuck worker.

use std::future::Future;
use std::time::Duration;

/// Run `operation`, mapping an elapsed `limit` into an error of the caller's type
///
/// # Arguments
/// * `operation` - The async operation to bound
/// * `limit` - Maximum time to wait
/// * `on_timeout` - Builds the error reported when `limit` elapses
pub async fn with_step_timeout<F, T, E>(
    operation: F,
    limit: Duration,
    on_timeout: impl FnOnce(Duration) -> E,
) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(limit, operation).await {
        Ok(result) => result,
        Err(_) => Err(on_timeout(limit)),
    }
}
