//! In-process transport.
//!
//! Mirrors the broker's delivery model closely enough for tests and local
//! development: every channel of a topic receives its own copy of each
//! message, consumers on the same channel share one queue, messages published
//! before any channel exists are held until the first subscription, and
//! requeued messages come back with their attempt count incremented.

use crate::error::{BrokerError, BrokerResult};
use crate::transport::{InboundMessage, MessageSource, Transport};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

#[derive(Debug)]
struct Envelope {
    body: Vec<u8>,
    attempts: u16,
}

#[derive(Debug, Clone)]
struct ChannelQueue {
    tx: mpsc::UnboundedSender<Envelope>,
    rx: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<Envelope>>>,
}

impl ChannelQueue {
    fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Arc::new(tokio::sync::Mutex::new(rx)),
        }
    }
}

#[derive(Debug, Default)]
struct TopicState {
    channels: HashMap<String, ChannelQueue>,
    backlog: Vec<Vec<u8>>,
}

#[derive(Debug)]
struct Inner {
    topics: Mutex<HashMap<String, TopicState>>,
    reachable: AtomicBool,
    published: AtomicU64,
    finished: AtomicU64,
    requeued: AtomicU64,
}

/// In-process topics with channel fan-out and requeue.
///
/// Clones share the same topics, so a test can keep one clone for
/// inspection while a client owns another.
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    inner: Arc<Inner>,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTransport {
    /// Create an empty, reachable transport.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                topics: Mutex::new(HashMap::new()),
                reachable: AtomicBool::new(true),
                published: AtomicU64::new(0),
                finished: AtomicU64::new(0),
                requeued: AtomicU64::new(0),
            }),
        }
    }

    /// Simulate the broker going away (`false`) or coming back (`true`).
    pub fn set_reachable(&self, reachable: bool) {
        self.inner.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Number of channels subscribed on `topic`.
    pub fn channel_count(&self, topic: &str) -> usize {
        self.inner
            .topics
            .lock()
            .get(topic)
            .map_or(0, |state| state.channels.len())
    }

    /// Messages held for `topic` until its first channel appears.
    pub fn backlog_len(&self, topic: &str) -> usize {
        self.inner
            .topics
            .lock()
            .get(topic)
            .map_or(0, |state| state.backlog.len())
    }

    /// Total messages accepted by [`Transport::publish`].
    pub fn published_count(&self) -> u64 {
        self.inner.published.load(Ordering::Relaxed)
    }

    /// Total messages acknowledged by consumers.
    pub fn finished_count(&self) -> u64 {
        self.inner.finished.load(Ordering::Relaxed)
    }

    /// Total messages returned for redelivery.
    pub fn requeued_count(&self) -> u64 {
        self.inner.requeued.load(Ordering::Relaxed)
    }

    /// Remove `topic` and its channels. Subscribed sources end once they
    /// have drained what was already queued.
    pub fn close_topic(&self, topic: &str) {
        self.inner.topics.lock().remove(topic);
        debug!(topic = %topic, "Closed in-memory topic");
    }

    fn ensure_reachable(&self) -> BrokerResult<()> {
        if self.inner.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(BrokerError::Connection("in-memory broker is unreachable".to_string()))
        }
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    type Source = MemorySource;

    fn name(&self) -> &'static str {
        "memory"
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> BrokerResult<()> {
        if !self.inner.reachable.load(Ordering::SeqCst) {
            return Err(BrokerError::Publish {
                topic: topic.to_string(),
                message: "no reachable nodes".to_string(),
            });
        }

        let mut topics = self.inner.topics.lock();
        let state = topics.entry(topic.to_string()).or_default();
        if state.channels.is_empty() {
            state.backlog.push(payload);
        } else {
            for queue in state.channels.values() {
                // Receivers live as long as the queue entry, so send cannot fail here.
                let _ = queue.tx.send(Envelope {
                    body: payload.clone(),
                    attempts: 1,
                });
            }
        }
        self.inner.published.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn probe(&self) -> BrokerResult<()> {
        self.ensure_reachable()
    }

    async fn subscribe(&self, topic: &str, channel: &str, _max_in_flight: usize) -> BrokerResult<MemorySource> {
        self.ensure_reachable()?;

        let mut topics = self.inner.topics.lock();
        let state = topics.entry(topic.to_string()).or_default();
        let first_channel = state.channels.is_empty();
        let queue = state
            .channels
            .entry(channel.to_string())
            .or_insert_with(ChannelQueue::new)
            .clone();

        if first_channel {
            for body in state.backlog.drain(..) {
                let _ = queue.tx.send(Envelope { body, attempts: 1 });
            }
        }

        Ok(MemorySource {
            rx: queue.rx,
            requeue: queue.tx.downgrade(),
            inner: Arc::clone(&self.inner),
        })
    }
}

/// Messages for one channel of an in-memory topic.
#[derive(Debug)]
pub struct MemorySource {
    rx: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<Envelope>>>,
    requeue: mpsc::WeakUnboundedSender<Envelope>,
    inner: Arc<Inner>,
}

#[async_trait]
impl MessageSource for MemorySource {
    type Message = MemoryMessage;

    async fn next_message(&mut self) -> Option<MemoryMessage> {
        let envelope = self.rx.lock().await.recv().await?;
        Some(MemoryMessage {
            envelope,
            requeue: self.requeue.clone(),
            inner: Arc::clone(&self.inner),
        })
    }
}

/// A message received from a [`MemorySource`].
#[derive(Debug)]
pub struct MemoryMessage {
    envelope: Envelope,
    requeue: mpsc::WeakUnboundedSender<Envelope>,
    inner: Arc<Inner>,
}

#[async_trait]
impl InboundMessage for MemoryMessage {
    fn body(&self) -> &[u8] {
        &self.envelope.body
    }

    fn attempts(&self) -> u16 {
        self.envelope.attempts
    }

    async fn finish(self) {
        self.inner.finished.fetch_add(1, Ordering::Relaxed);
    }

    async fn requeue(self, delay: Duration) {
        self.inner.requeued.fetch_add(1, Ordering::Relaxed);
        let envelope = Envelope {
            body: self.envelope.body,
            attempts: self.envelope.attempts.saturating_add(1),
        };
        let Some(tx) = self.requeue.upgrade() else {
            debug!("Topic closed, requeued message discarded");
            return;
        };

        if delay.is_zero() {
            let _ = tx.send(envelope);
        } else {
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let _ = tx.send(envelope);
            });
        }
    }
}
