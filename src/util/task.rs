//! Helpers for spawned background tasks.
use futures::FutureExt;
use std::panic::AssertUnwindSafe;

/// Run a future to completion, converting a panic into `Err(message)`.
///
/// Spawned tasks that panic are otherwise swallowed by the runtime, which
/// would leave whoever waits on their result hanging.
pub async fn catch_task_panic<F, T>(future: F) -> Result<T, String>
where
    F: std::future::Future<Output = T>,
{
    AssertUnwindSafe(future)
        .catch_unwind()
        .await
        .map_err(|panic| {
            if let Some(s) = panic.downcast_ref::<&'static str>() {
                s.to_string()
            } else if let Some(s) = panic.downcast_ref::<String>() {
                s.clone()
            } else {
                "Unknown panic payload".to_string()
            }
        })
}
