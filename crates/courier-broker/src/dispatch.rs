//! Per-consumer dispatch loop.

use crate::consumer::{ConsumerCounters, ConsumerState};
use crate::delivery::{Delivery, HandlerResult, MessageHandler};
use crate::metrics::BrokerMetrics;
use crate::scope::ExecutionScope;
use crate::transport::{InboundMessage, MessageSource};
use courier_config::BrokerConfig;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Consumer-side settings shared by every registration on a client.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    /// Channel every consumer subscribes on.
    pub channel: String,

    /// Deadline after which a handler's scope is cancelled.
    pub handler_timeout: Duration,

    /// Messages handled concurrently per consumer.
    pub max_in_flight: usize,

    /// Deliveries after which a failing message is dropped (0 = never).
    pub max_attempts: u16,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            channel: "channel".to_string(),
            handler_timeout: Duration::from_secs(30),
            max_in_flight: 16,
            max_attempts: 5,
        }
    }
}

impl From<&BrokerConfig> for DispatchSettings {
    fn from(config: &BrokerConfig) -> Self {
        Self {
            channel: config.channel.clone(),
            handler_timeout: config.handler_timeout(),
            max_in_flight: config.max_in_flight,
            max_attempts: config.max_attempts,
        }
    }
}

/// How a handler invocation ended.
enum Outcome {
    Success,
    Failed(&'static str),
}

/// State shared by the loop and every message task it spawns.
struct Shared {
    topic: String,
    handler: MessageHandler,
    settings: DispatchSettings,
    token: CancellationToken,
    counters: Arc<ConsumerCounters>,
}

/// Pulls messages from one subscription and runs the handler for each.
pub(crate) struct Dispatcher<S: MessageSource> {
    source: S,
    shared: Arc<Shared>,
    state: watch::Sender<ConsumerState>,
}

impl<S: MessageSource> Dispatcher<S> {
    pub(crate) fn new(
        topic: &str,
        source: S,
        handler: MessageHandler,
        settings: DispatchSettings,
        token: CancellationToken,
        state: watch::Sender<ConsumerState>,
        counters: Arc<ConsumerCounters>,
    ) -> Self {
        Self {
            source,
            shared: Arc::new(Shared {
                topic: topic.to_string(),
                handler,
                settings,
                token,
                counters,
            }),
            state,
        }
    }

    /// Run until the source ends or the consumer is shut down, then wait for
    /// in-flight messages to settle.
    pub(crate) async fn run(self) {
        let Self {
            mut source,
            shared,
            state,
        } = self;

        let permits = shared.settings.max_in_flight.max(1);
        let semaphore = Arc::new(Semaphore::new(permits));
        BrokerMetrics::consumer_started();
        info!(max_in_flight = permits, "Dispatch loop started");

        loop {
            let permit = tokio::select! {
                _ = shared.token.cancelled() => break,
                permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let message = tokio::select! {
                _ = shared.token.cancelled() => break,
                message = source.next_message() => match message {
                    Some(message) => message,
                    None => {
                        info!("Message source ended");
                        break;
                    }
                },
            };

            let attempts = message.attempts();
            let task_shared = Arc::clone(&shared);
            tokio::spawn(
                async move {
                    handle_message(&task_shared, message).await;
                    drop(permit);
                }
                .instrument(info_span!("message", attempts)),
            );
        }

        info!("Waiting for in-flight messages...");
        let _ = semaphore
            .acquire_many(u32::try_from(permits).unwrap_or(u32::MAX))
            .await;

        BrokerMetrics::consumer_stopped();
        state.send_replace(ConsumerState::Terminated);

        info!(
            finished = shared.counters.finished.load(Ordering::Relaxed),
            requeued = shared.counters.requeued.load(Ordering::Relaxed),
            "Dispatch loop stopped"
        );
    }
}

async fn handle_message<M: InboundMessage>(shared: &Shared, message: M) {
    let topic = shared.topic.as_str();
    let attempts = message.attempts();
    let body = String::from_utf8_lossy(message.body()).into_owned();

    shared.counters.received.fetch_add(1, Ordering::Relaxed);
    BrokerMetrics::message_received(topic);

    let scope = ExecutionScope::with_token(shared.token.child_token(), shared.settings.handler_timeout);
    let delivery = Delivery {
        topic: shared.topic.clone(),
        body,
        attempts,
        scope: scope.clone(),
    };

    let started = Instant::now();
    let outcome = invoke(shared, delivery, &scope).await;
    BrokerMetrics::handler_completed(topic, started.elapsed());

    match outcome {
        Outcome::Success => {
            message.finish().await;
            shared.counters.finished.fetch_add(1, Ordering::Relaxed);
            BrokerMetrics::message_finished(topic);
            debug!(attempts, "Message finished");
        }
        Outcome::Failed(reason) => {
            let max_attempts = shared.settings.max_attempts;
            if max_attempts > 0 && attempts >= max_attempts {
                error!(attempts, max_attempts, "Giving up on message");
                message.finish().await;
                shared.counters.dropped.fetch_add(1, Ordering::Relaxed);
                BrokerMetrics::message_dropped(topic);
            } else {
                message.requeue(Duration::ZERO).await;
                shared.counters.requeued.fetch_add(1, Ordering::Relaxed);
                BrokerMetrics::message_requeued(topic, reason);
                debug!(attempts, reason, "Message requeued");
            }
        }
    }
}

/// Run the handler, cancelling its scope at the deadline without aborting it.
async fn invoke(shared: &Shared, delivery: Delivery, scope: &ExecutionScope) -> Outcome {
    let handler = Arc::clone(&shared.handler);
    let invocation = AssertUnwindSafe(async move { handler(delivery).await }).catch_unwind();
    tokio::pin!(invocation);

    let result = tokio::select! {
        result = &mut invocation => result,
        () = tokio::time::sleep_until(scope.deadline()) => {
            warn!(
                timeout_secs = shared.settings.handler_timeout.as_secs(),
                "Handler outlived its deadline, scope cancelled"
            );
            BrokerMetrics::deadline_exceeded(&shared.topic);
            scope.cancel();
            invocation.await
        }
    };

    classify(result)
}

fn classify(result: Result<HandlerResult, Box<dyn Any + Send>>) -> Outcome {
    match result {
        Ok(Ok(())) => Outcome::Success,
        Ok(Err(e)) => {
            warn!(error = %e, "Handler failed");
            Outcome::Failed("error")
        }
        Err(panic) => {
            error!(panic = %panic_message(panic.as_ref()), "Handler panicked");
            Outcome::Failed("panic")
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BrokerError;

    #[test]
    fn test_settings_from_broker_config() {
        let config = BrokerConfig {
            channel: "billing".into(),
            handler_timeout_secs: 5,
            max_in_flight: 2,
            ..BrokerConfig::default()
        };
        let settings = DispatchSettings::from(&config);
        assert_eq!(settings.channel, "billing");
        assert_eq!(settings.handler_timeout, Duration::from_secs(5));
        assert_eq!(settings.max_in_flight, 2);
        assert_eq!(settings.max_attempts, 5);
    }

    #[test]
    fn test_classify() {
        assert!(matches!(classify(Ok(Ok(()))), Outcome::Success));
        assert!(matches!(
            classify(Ok(Err(BrokerError::handler("boom")))),
            Outcome::Failed("error")
        ));
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert!(matches!(classify(Err(payload)), Outcome::Failed("panic")));
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new(String::from("bad state"));
        assert_eq!(panic_message(payload.as_ref()), "bad state");

        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
