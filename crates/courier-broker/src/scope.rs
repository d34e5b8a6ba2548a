//! Per-invocation execution scope.

use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Cancellation and deadline for one handler invocation.
///
/// The scope is cancelled when its deadline passes or the owning consumer
/// shuts down. Cancellation is advisory: the handler is never aborted, it is
/// expected to observe [`ExecutionScope::cancelled`] and wind down.
#[derive(Debug, Clone)]
pub struct ExecutionScope {
    token: CancellationToken,
    deadline: Instant,
}

impl ExecutionScope {
    /// Create a scope that expires `timeout` from now.
    pub fn new(timeout: Duration) -> Self {
        Self::with_token(CancellationToken::new(), timeout)
    }

    /// Create a scope tied to an existing token, typically a child of the
    /// consumer's shutdown token.
    pub fn with_token(token: CancellationToken, timeout: Duration) -> Self {
        Self {
            token,
            deadline: Instant::now() + timeout,
        }
    }

    /// The instant after which the scope is cancelled.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Time left before the deadline, zero once it has passed.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Returns true once the scope has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Completes when the scope is cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    /// Cancel the scope.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// The underlying token, for passing to other cancellable work.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_remaining_counts_down() {
        let scope = ExecutionScope::new(Duration::from_secs(30));
        assert_eq!(scope.remaining(), Duration::from_secs(30));

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(scope.remaining(), Duration::from_secs(20));

        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(scope.remaining(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_parent_cancellation_propagates() {
        let parent = CancellationToken::new();
        let scope = ExecutionScope::with_token(parent.child_token(), Duration::from_secs(30));
        assert!(!scope.is_cancelled());

        parent.cancel();
        scope.cancelled().await;
        assert!(scope.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancel_does_not_touch_parent() {
        let parent = CancellationToken::new();
        let scope = ExecutionScope::with_token(parent.child_token(), Duration::from_secs(30));
        scope.cancel();
        assert!(scope.is_cancelled());
        assert!(!parent.is_cancelled());
    }
}
