//! Registered consumer handles.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Lifecycle of a registered consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    /// Registration started.
    Created,
    /// Discovery service reachable.
    Connected,
    /// Subscribed and dispatching.
    Running,
    /// Dispatch loop has exited.
    Terminated,
}

impl fmt::Display for ConsumerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Connected => write!(f, "connected"),
            Self::Running => write!(f, "running"),
            Self::Terminated => write!(f, "terminated"),
        }
    }
}

/// Per-consumer message counters.
#[derive(Debug, Default)]
pub struct ConsumerCounters {
    pub(crate) received: AtomicU64,
    pub(crate) finished: AtomicU64,
    pub(crate) requeued: AtomicU64,
    pub(crate) dropped: AtomicU64,
}

/// Snapshot of a consumer's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    /// Messages received.
    pub received: u64,
    /// Messages acknowledged.
    pub finished: u64,
    /// Messages returned for redelivery.
    pub requeued: u64,
    /// Messages dropped after exhausting their attempts.
    pub dropped: u64,
}

/// Handle to a registered consumer.
///
/// Dropping the handle does not stop the consumer; call
/// [`ConsumerHandle::shutdown`] or shut down the owning client.
#[derive(Debug, Clone)]
pub struct ConsumerHandle {
    id: Uuid,
    topic: String,
    channel: String,
    state: watch::Receiver<ConsumerState>,
    token: CancellationToken,
    counters: Arc<ConsumerCounters>,
}

impl ConsumerHandle {
    pub(crate) fn new(
        topic: &str,
        channel: &str,
        state: watch::Receiver<ConsumerState>,
        token: CancellationToken,
        counters: Arc<ConsumerCounters>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            topic: topic.to_string(),
            channel: channel.to_string(),
            state,
            token,
            counters,
        }
    }

    /// Unique consumer ID.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Subscribed topic.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Subscribed channel.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConsumerState {
        *self.state.borrow()
    }

    /// Counter snapshot.
    pub fn stats(&self) -> ConsumerStats {
        ConsumerStats {
            received: self.counters.received.load(Ordering::Relaxed),
            finished: self.counters.finished.load(Ordering::Relaxed),
            requeued: self.counters.requeued.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
        }
    }

    /// Stop taking new messages. In-flight handlers see their scope cancelled.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Wait until the dispatch loop has exited and in-flight messages settled.
    pub async fn terminated(&self) {
        let mut state = self.state.clone();
        // Sender dropped means the loop is gone.
        let _ = state.wait_for(|s| *s == ConsumerState::Terminated).await;
    }
}
