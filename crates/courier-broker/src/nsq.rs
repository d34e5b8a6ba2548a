//! NSQ transport.
//!
//! Publishes through a single `nsqd` TCP connection and discovers consumer
//! sources through `nsqlookupd`.

use crate::client::BrokerClient;
use crate::dispatch::DispatchSettings;
use crate::error::{BrokerError, BrokerResult};
use crate::transport::{InboundMessage, MessageSource, Transport};
use async_trait::async_trait;
use courier_config::BrokerConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_nsq::{
    NSQChannel, NSQConsumer, NSQConsumerConfig, NSQConsumerConfigSources, NSQConsumerLookupConfig, NSQEvent,
    NSQMessage, NSQProducer, NSQProducerConfig, NSQRequeueDelay, NSQTopic,
};
use tracing::{debug, info, warn};

/// Default publish acknowledgement deadline.
pub const DEFAULT_PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Broker client backed by NSQ.
pub type NsqClient = BrokerClient<NsqTransport>;

/// NSQ connection parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NsqConfig {
    /// Host running `nsqd` and `nsqlookupd`.
    pub host: String,
    /// `nsqd` TCP port.
    pub tcp_port: u16,
    /// `nsqlookupd` HTTP port.
    pub http_port: u16,
}

impl Default for NsqConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            tcp_port: 4150,
            http_port: 4161,
        }
    }
}

impl From<&BrokerConfig> for NsqConfig {
    fn from(config: &BrokerConfig) -> Self {
        Self {
            host: config.host.clone(),
            tcp_port: config.tcp_port,
            http_port: config.http_port,
        }
    }
}

impl NsqConfig {
    /// Producer address (`host:tcp_port`).
    pub fn producer_address(&self) -> String {
        format!("{}:{}", self.host, self.tcp_port)
    }

    /// Lookupd base URL (`http://host:http_port`).
    pub fn lookupd_url(&self) -> String {
        format!("http://{}:{}", self.host, self.http_port)
    }
}

/// Create an NSQ client with default consumer settings.
///
/// Must be called from within a tokio runtime: the producer starts
/// connecting in the background immediately.
pub fn new_nsq_client(config: &NsqConfig) -> BrokerResult<NsqClient> {
    let transport = NsqTransport::new(config, DEFAULT_PUBLISH_TIMEOUT)?;
    BrokerClient::new(transport, DispatchSettings::default())
}

/// Create an NSQ client from the application's broker configuration.
pub fn connect_nsq(config: &BrokerConfig) -> BrokerResult<NsqClient> {
    let transport = NsqTransport::new(&NsqConfig::from(config), config.publish_timeout())?;
    BrokerClient::new(transport, DispatchSettings::from(config))
}

struct ProducerState {
    producer: NSQProducer,
    acks: AckLedger,
}

/// What a producer event meant for outstanding publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AckEvent {
    Progress,
    /// The connection dropped; unacknowledged publishes are gone.
    Lost,
    Closed,
}

/// Acknowledgement accounting for the single producer connection.
///
/// `pending` counts publishes handed to the connection but not yet
/// acknowledged, including ones whose caller gave up waiting. nsqd
/// acknowledges in order on one connection, so a caller is settled once
/// every publish queued before and including its own has been acknowledged.
#[derive(Debug, Default)]
struct AckLedger {
    healthy: bool,
    pending: usize,
}

impl AckLedger {
    fn observe(&mut self, event: Option<NSQEvent>) -> AckEvent {
        match event {
            Some(NSQEvent::Healthy()) => self.healthy = true,
            Some(NSQEvent::Unhealthy()) => {
                self.healthy = false;
                self.pending = 0;
                return AckEvent::Lost;
            }
            Some(NSQEvent::Ok()) => self.pending = self.pending.saturating_sub(1),
            Some(_) => {}
            None => return AckEvent::Closed,
        }
        AckEvent::Progress
    }

    /// Reserve an acknowledgement slot before the PUB is queued.
    fn reserve(&mut self) {
        self.pending += 1;
    }

    /// Release a slot whose PUB never reached the connection.
    fn release(&mut self) {
        self.pending = self.pending.saturating_sub(1);
    }

    fn settled(&self) -> bool {
        self.pending == 0
    }
}

/// NSQ implementation of [`Transport`].
pub struct NsqTransport {
    config: NsqConfig,
    producer: Mutex<ProducerState>,
    http: reqwest::Client,
    publish_timeout: Duration,
}

impl NsqTransport {
    /// Create the transport and start the producer connection.
    pub fn new(config: &NsqConfig, publish_timeout: Duration) -> BrokerResult<Self> {
        if config.host.trim().is_empty() {
            return Err(BrokerError::Configuration("NSQ host cannot be empty".to_string()));
        }
        if publish_timeout.is_zero() {
            return Err(BrokerError::Configuration("publish timeout must be positive".to_string()));
        }

        let http = reqwest::Client::builder()
            .timeout(PROBE_TIMEOUT)
            .build()
            .map_err(|e| BrokerError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        info!(
            producer = %config.producer_address(),
            lookupd = %config.lookupd_url(),
            "Creating NSQ transport"
        );
        let producer = NSQProducerConfig::new(config.producer_address()).build();

        Ok(Self {
            config: config.clone(),
            producer: Mutex::new(ProducerState {
                producer,
                acks: AckLedger::default(),
            }),
            http,
            publish_timeout,
        })
    }

    /// Connection parameters.
    pub fn config(&self) -> &NsqConfig {
        &self.config
    }

    async fn publish_acknowledged(&self, topic: &str, nsq_topic: &Arc<NSQTopic>, payload: Vec<u8>) -> BrokerResult<()> {
        let mut guard = self.producer.lock().await;
        let state = &mut *guard;

        while !state.acks.healthy {
            let event = state.producer.consume().await;
            if state.acks.observe(event) == AckEvent::Closed {
                return Err(publish_error(topic, "producer closed"));
            }
        }

        // Reserved first so a cancelled caller's late acknowledgement is
        // never credited to the next publish.
        state.acks.reserve();
        if let Err(e) = state.producer.publish(nsq_topic, payload).await {
            state.acks.release();
            return Err(publish_error(topic, e));
        }

        while !state.acks.settled() {
            let event = state.producer.consume().await;
            match state.acks.observe(event) {
                AckEvent::Progress => {}
                AckEvent::Lost => return Err(publish_error(topic, "connection lost before acknowledgement")),
                AckEvent::Closed => return Err(publish_error(topic, "producer closed")),
            }
        }
        Ok(())
    }
}

fn publish_error(topic: &str, message: impl std::fmt::Display) -> BrokerError {
    BrokerError::Publish {
        topic: topic.to_string(),
        message: message.to_string(),
    }
}

#[async_trait]
impl Transport for NsqTransport {
    type Source = NsqSource;

    fn name(&self) -> &'static str {
        "nsq"
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> BrokerResult<()> {
        let nsq_topic = NSQTopic::new(topic).ok_or_else(|| BrokerError::InvalidTopic(topic.to_string()))?;

        tokio::time::timeout(self.publish_timeout, self.publish_acknowledged(topic, &nsq_topic, payload))
            .await
            .map_err(|_| {
                publish_error(
                    topic,
                    format!("not acknowledged within {:?}", self.publish_timeout),
                )
            })?
    }

    async fn probe(&self) -> BrokerResult<()> {
        let url = format!("{}/ping", self.config.lookupd_url());
        debug!(url = %url, "Probing nsqlookupd");

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| BrokerError::Connection(format!("nsqlookupd at {} unreachable: {}", url, e)))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            warn!(url = %url, status = %status, "nsqlookupd ping failed");
            Err(BrokerError::Connection(format!(
                "nsqlookupd at {} answered ping with {}",
                url, status
            )))
        }
    }

    async fn subscribe(&self, topic: &str, channel: &str, max_in_flight: usize) -> BrokerResult<NsqSource> {
        let nsq_topic = NSQTopic::new(topic).ok_or_else(|| BrokerError::InvalidTopic(topic.to_string()))?;
        let nsq_channel = NSQChannel::new(channel)
            .ok_or_else(|| BrokerError::Configuration(format!("invalid channel name '{}'", channel)))?;

        let mut addresses = HashSet::new();
        addresses.insert(self.config.lookupd_url());

        let consumer = NSQConsumerConfig::new(nsq_topic, nsq_channel)
            .set_max_in_flight(u32::try_from(max_in_flight).unwrap_or(u32::MAX))
            .set_sources(NSQConsumerConfigSources::Lookup(
                NSQConsumerLookupConfig::new().set_addresses(addresses),
            ))
            .build();

        debug!(topic = %topic, channel = %channel, "Subscribed through nsqlookupd");
        Ok(NsqSource { consumer })
    }
}

impl std::fmt::Debug for NsqTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NsqTransport")
            .field("config", &self.config)
            .field("publish_timeout", &self.publish_timeout)
            .finish()
    }
}

/// Messages for one NSQ subscription.
pub struct NsqSource {
    consumer: NSQConsumer,
}

#[async_trait]
impl MessageSource for NsqSource {
    type Message = NsqMessage;

    async fn next_message(&mut self) -> Option<NsqMessage> {
        self.consumer.consume_filtered().await.map(NsqMessage)
    }
}

/// A message received from NSQ.
pub struct NsqMessage(NSQMessage);

#[async_trait]
impl InboundMessage for NsqMessage {
    fn body(&self) -> &[u8] {
        &self.0.body
    }

    fn attempts(&self) -> u16 {
        self.0.attempt
    }

    async fn finish(self) {
        self.0.finish().await;
    }

    async fn requeue(self, delay: Duration) {
        let delay = if delay.is_zero() {
            NSQRequeueDelay::NoDelay
        } else {
            NSQRequeueDelay::CustomDelay(delay)
        };
        self.0.requeue(delay).await;
    }
}
