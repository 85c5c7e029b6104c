//! Retry logic for individual backend calls.
//!
//! A remote call that fails with a retryable [`BackendError`] is repeated a
//! bounded number of times before the error reaches the turn executor. Whether
//! an error is retryable is decided by the backend that produced it.

use crate::error::BackendError;
use std::future::Future;

/// Executes a backend call with retry logic.
///
/// - `max_retries` is the number of attempts after the first one.
/// - Only errors with [`BackendError::is_retryable`] are retried.
/// - The delay between attempts comes from [`BackendError::retry_delay`].
///
/// # Examples
///
/// ```rust,ignore
/// use llm_chatroom::backend::retry::retry_execution;
///
/// let thread = retry_execution(3, "create_thread", || backend.create_thread()).await?;
/// ```
pub async fn retry_execution<F, Fut, T>(
    max_retries: u32,
    operation_name: &str,
    operation: F,
) -> Result<T, BackendError>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, BackendError>> + Send,
    T: Send,
{
    let mut attempts = 0;

    loop {
        attempts += 1;

        match operation().await {
            Ok(output) => {
                if attempts > 1 {
                    log::info!(
                        "{} succeeded on attempt {}/{}",
                        operation_name,
                        attempts,
                        max_retries + 1
                    );
                }
                return Ok(output);
            }
            Err(e) if e.is_retryable() && attempts <= max_retries => {
                let delay = e.retry_delay(attempts);
                log::warn!(
                    "{} failed (attempt {}/{}): {}. Retrying in {:?}...",
                    operation_name,
                    attempts,
                    max_retries + 1,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                if e.is_retryable() {
                    log::error!(
                        "{} failed after {} attempts (max retries exhausted): {}",
                        operation_name,
                        attempts,
                        e
                    );
                } else {
                    log::error!("{} failed with non-retryable error: {}", operation_name, e);
                }
                return Err(e);
            }
        }
    }
}
