//! Racing an operation against a deadline.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// The operation did not finish before its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation did not complete within {0:?}")]
pub struct DeadlineExceeded(pub Duration);

/// Run `operation`, giving up after `deadline`.
///
/// On expiry the operation's future is dropped before this returns, so it
/// cannot touch shared state after the caller has seen the timeout. Cleanup
/// that must happen on abandonment belongs in `Drop` impls held by the
/// operation (the connection's pending-request guard is one).
pub async fn run_with_deadline<F>(deadline: Duration, operation: F) -> Result<F::Output, DeadlineExceeded>
where
    F: Future,
{
    tokio::time::timeout(deadline, operation)
        .await
        .map_err(|_| DeadlineExceeded(deadline))
}
