#![allow(dead_code)]

use std::time::Duration;

pub use flowloop_test_utils::init_tracing;

/// Generous upper bound for waiting on the continuous worker.
pub const WAIT: Duration = Duration::from_secs(5);

/// Run a future with a 5-second timeout.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(WAIT, f)
        .await
        .expect("Test timed out after 5 seconds")
}
