//! Broker capability and its transport-generic client.

use crate::consumer::{ConsumerCounters, ConsumerHandle, ConsumerState};
use crate::delivery::{handler_fn, Delivery, HandlerResult, MessageHandler};
use crate::dispatch::{DispatchSettings, Dispatcher};
use crate::error::{BrokerError, BrokerResult};
use crate::event::{validate_channel, validate_topic, MessageEvent};
use crate::metrics::BrokerMetrics;
use crate::transport::Transport;
use async_trait::async_trait;
use courier_core::Interface;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

/// Topic-based publish/subscribe capability.
#[async_trait]
pub trait MessageBroker: Interface + Send + Sync {
    /// Publish an event, returning once the broker has acknowledged it.
    async fn publish(&self, event: &MessageEvent) -> BrokerResult<()>;

    /// Read the body of `delivery` for `topic`.
    ///
    /// Fails with [`BrokerError::ConsumeMissing`] when the delivery carries
    /// no message for that topic.
    fn consume(&self, delivery: &Delivery, topic: &str) -> BrokerResult<String> {
        let result = delivery.consume(topic);
        match &result {
            Ok(body) => debug!(topic = %topic, body = %body, "Consumed message"),
            Err(_) => debug!(topic = %topic, delivered = %delivery.topic, "Nothing to consume"),
        }
        result
    }

    /// Subscribe `handler` to `topic` on the client's channel.
    ///
    /// Registration is all-or-nothing: if the discovery service cannot be
    /// reached no subscription or dispatch task is left behind.
    async fn register_consumer(&self, topic: &str, handler: MessageHandler) -> BrokerResult<ConsumerHandle>;
}

/// Broker client over any [`Transport`].
///
/// Consumers registered through a client stop when the client is shut down
/// or dropped.
pub struct BrokerClient<T: Transport> {
    transport: Arc<T>,
    settings: DispatchSettings,
    shutdown: CancellationToken,
    consumers: Mutex<Vec<ConsumerHandle>>,
}

impl<T: Transport> BrokerClient<T> {
    /// Create a client over `transport`.
    pub fn new(transport: T, settings: DispatchSettings) -> BrokerResult<Self> {
        validate_channel(&settings.channel)?;
        if settings.max_in_flight == 0 {
            return Err(BrokerError::Configuration("max_in_flight must be at least 1".to_string()));
        }
        if settings.handler_timeout.is_zero() {
            return Err(BrokerError::Configuration("handler timeout must be positive".to_string()));
        }

        Ok(Self {
            transport: Arc::new(transport),
            settings,
            shutdown: CancellationToken::new(),
            consumers: Mutex::new(Vec::new()),
        })
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Consumer settings.
    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    /// Handles of registered consumers. Terminated ones are dropped on the
    /// next registration.
    pub fn consumers(&self) -> Vec<ConsumerHandle> {
        self.consumers.lock().clone()
    }

    /// Returns true once [`BrokerClient::shutdown`] has been called.
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Register an async closure as a consumer.
    pub async fn register<F, Fut>(&self, topic: &str, f: F) -> BrokerResult<ConsumerHandle>
    where
        F: Fn(Delivery) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.register_consumer(topic, handler_fn(f)).await
    }

    /// Stop every consumer and wait for in-flight messages to settle.
    pub async fn shutdown(&self) {
        info!(transport = self.transport.name(), "Shutting down broker client...");
        self.shutdown.cancel();

        for consumer in self.consumers() {
            consumer.terminated().await;
        }
        info!("Broker client stopped");
    }
}

#[async_trait]
impl<T: Transport> MessageBroker for BrokerClient<T> {
    async fn publish(&self, event: &MessageEvent) -> BrokerResult<()> {
        if self.is_shut_down() {
            return Err(BrokerError::Shutdown);
        }
        validate_topic(&event.topic)?;

        let started = Instant::now();
        match self.transport.publish(&event.topic, event.payload.clone()).await {
            Ok(()) => {
                BrokerMetrics::message_published(&event.topic, started.elapsed());
                debug!(topic = %event.topic, bytes = event.payload.len(), "Published message");
                Ok(())
            }
            Err(e) => {
                BrokerMetrics::publish_failed(&event.topic);
                warn!(topic = %event.topic, error = %e, "Failed to publish message");
                Err(e)
            }
        }
    }

    async fn register_consumer(&self, topic: &str, handler: MessageHandler) -> BrokerResult<ConsumerHandle> {
        if self.is_shut_down() {
            return Err(BrokerError::Shutdown);
        }
        validate_topic(topic)?;

        let channel = self.settings.channel.as_str();
        let (state_tx, state_rx) = watch::channel(ConsumerState::Created);

        if let Err(e) = self.transport.probe().await {
            warn!(topic = %topic, error = %e, "Discovery service unreachable, consumer not registered");
            return Err(e);
        }
        state_tx.send_replace(ConsumerState::Connected);

        let source = self
            .transport
            .subscribe(topic, channel, self.settings.max_in_flight)
            .await?;

        let token = self.shutdown.child_token();
        let counters = Arc::new(ConsumerCounters::default());
        let handle = ConsumerHandle::new(topic, channel, state_rx, token.clone(), Arc::clone(&counters));

        state_tx.send_replace(ConsumerState::Running);
        let dispatcher = Dispatcher::new(
            topic,
            source,
            handler,
            self.settings.clone(),
            token,
            state_tx,
            counters,
        );
        tokio::spawn(dispatcher.run().instrument(info_span!(
            "consumer",
            topic = %topic,
            channel = %channel,
            transport = self.transport.name()
        )));

        {
            let mut consumers = self.consumers.lock();
            consumers.retain(|c| c.state() != ConsumerState::Terminated);
            consumers.push(handle.clone());
        }
        info!(
            topic = %topic,
            channel = %channel,
            consumer_id = %handle.id(),
            "Registered consumer"
        );

        Ok(handle)
    }
}

impl<T: Transport> Drop for BrokerClient<T> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl<T: Transport> std::fmt::Debug for BrokerClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerClient")
            .field("transport", &self.transport.name())
            .field("settings", &self.settings)
            .field("consumers", &self.consumers.lock().len())
            .finish()
    }
}
