//! # Courier Broker
//!
//! Topic-based publish/subscribe over a pluggable [`Transport`].
//!
//! ## Features
//!
//! - Publish awaited until the broker acknowledges it
//! - Consumers registered all-or-nothing, after a discovery probe
//! - One task per message, bounded by `max_in_flight`
//! - Handler `Err` or panic requeues the message for immediate redelivery
//! - Per-invocation deadline that cancels the handler's scope without
//!   aborting it
//!
//! ## Example
//!
//! ```rust,ignore
//! use courier_broker::{new_nsq_client, MessageBroker, MessageEvent, NsqConfig};
//!
//! let client = new_nsq_client(&NsqConfig::default())?;
//! client
//!     .register("orders", |delivery| async move {
//!         println!("received {}", delivery.body);
//!         Ok(())
//!     })
//!     .await?;
//! client.publish(&MessageEvent::new("orders", "order-42")).await?;
//! ```

mod client;
mod consumer;
mod delivery;
mod dispatch;
mod error;
mod event;
mod memory;
pub mod metrics;
mod nsq;
mod scope;
mod transport;

pub use client::{BrokerClient, MessageBroker};
pub use consumer::{ConsumerHandle, ConsumerState, ConsumerStats};
pub use delivery::{handler_fn, Delivery, HandlerResult, MessageHandler};
pub use dispatch::DispatchSettings;
pub use error::{BrokerError, BrokerResult};
pub use event::{validate_channel, validate_topic, MessageEvent, MAX_NAME_LEN};
pub use memory::{MemoryMessage, MemorySource, MemoryTransport};
pub use metrics::{register_metrics, BrokerMetrics};
pub use nsq::{connect_nsq, new_nsq_client, NsqClient, NsqConfig, NsqMessage, NsqSource, NsqTransport, DEFAULT_PUBLISH_TIMEOUT};
pub use scope::ExecutionScope;
pub use transport::{InboundMessage, MessageSource, Transport};
