//! Metrics for broker monitoring.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::time::Duration;

/// Metric names for the broker.
pub mod names {
    /// Total messages published.
    pub const MESSAGES_PUBLISHED_TOTAL: &str = "courier_broker_messages_published_total";
    /// Total failed publishes.
    pub const PUBLISH_ERRORS_TOTAL: &str = "courier_broker_publish_errors_total";
    /// Total messages received by consumers.
    pub const MESSAGES_RECEIVED_TOTAL: &str = "courier_broker_messages_received_total";
    /// Total messages finished (acknowledged).
    pub const MESSAGES_FINISHED_TOTAL: &str = "courier_broker_messages_finished_total";
    /// Total messages requeued.
    pub const MESSAGES_REQUEUED_TOTAL: &str = "courier_broker_messages_requeued_total";
    /// Total messages dropped after exhausting attempts.
    pub const MESSAGES_DROPPED_TOTAL: &str = "courier_broker_messages_dropped_total";
    /// Total handler invocations that outlived their deadline.
    pub const HANDLER_DEADLINES_EXCEEDED_TOTAL: &str = "courier_broker_handler_deadlines_exceeded_total";

    /// Messages currently being handled.
    pub const MESSAGES_IN_FLIGHT: &str = "courier_broker_messages_in_flight";
    /// Registered consumers.
    pub const CONSUMERS_ACTIVE: &str = "courier_broker_consumers_active";

    /// Handler duration in seconds.
    pub const HANDLER_DURATION_SECONDS: &str = "courier_broker_handler_duration_seconds";
    /// Publish duration in seconds.
    pub const PUBLISH_DURATION_SECONDS: &str = "courier_broker_publish_duration_seconds";
}

/// Register all metric descriptions.
pub fn register_metrics() {
    describe_counter!(names::MESSAGES_PUBLISHED_TOTAL, "Total number of messages published");
    describe_counter!(names::PUBLISH_ERRORS_TOTAL, "Total number of failed publishes");
    describe_counter!(names::MESSAGES_RECEIVED_TOTAL, "Total number of messages received");
    describe_counter!(names::MESSAGES_FINISHED_TOTAL, "Total number of messages acknowledged");
    describe_counter!(names::MESSAGES_REQUEUED_TOTAL, "Total number of messages requeued");
    describe_counter!(
        names::MESSAGES_DROPPED_TOTAL,
        "Total number of messages dropped after exhausting their attempts"
    );
    describe_counter!(
        names::HANDLER_DEADLINES_EXCEEDED_TOTAL,
        "Total number of handler invocations that outlived their deadline"
    );

    describe_gauge!(names::MESSAGES_IN_FLIGHT, "Current number of messages being handled");
    describe_gauge!(names::CONSUMERS_ACTIVE, "Current number of running consumers");

    describe_histogram!(names::HANDLER_DURATION_SECONDS, "Handler duration in seconds");
    describe_histogram!(names::PUBLISH_DURATION_SECONDS, "Publish duration in seconds");
}

/// Broker metrics recorder.
#[derive(Clone)]
pub struct BrokerMetrics;

impl BrokerMetrics {
    /// Record a successful publish.
    pub fn message_published(topic: &str, duration: Duration) {
        counter!(names::MESSAGES_PUBLISHED_TOTAL, "topic" => topic.to_string()).increment(1);
        histogram!(names::PUBLISH_DURATION_SECONDS, "topic" => topic.to_string()).record(duration.as_secs_f64());
    }

    /// Record a failed publish.
    pub fn publish_failed(topic: &str) {
        counter!(names::PUBLISH_ERRORS_TOTAL, "topic" => topic.to_string()).increment(1);
    }

    /// Record a message received by a consumer.
    pub fn message_received(topic: &str) {
        counter!(names::MESSAGES_RECEIVED_TOTAL, "topic" => topic.to_string()).increment(1);
        gauge!(names::MESSAGES_IN_FLIGHT, "topic" => topic.to_string()).increment(1.0);
    }

    /// Record a handler completing, whatever its outcome.
    pub fn handler_completed(topic: &str, duration: Duration) {
        gauge!(names::MESSAGES_IN_FLIGHT, "topic" => topic.to_string()).decrement(1.0);
        histogram!(names::HANDLER_DURATION_SECONDS, "topic" => topic.to_string()).record(duration.as_secs_f64());
    }

    /// Record a message acknowledged.
    pub fn message_finished(topic: &str) {
        counter!(names::MESSAGES_FINISHED_TOTAL, "topic" => topic.to_string()).increment(1);
    }

    /// Record a message requeued. `reason` is `error` or `panic`.
    pub fn message_requeued(topic: &str, reason: &'static str) {
        counter!(
            names::MESSAGES_REQUEUED_TOTAL,
            "topic" => topic.to_string(),
            "reason" => reason
        )
        .increment(1);
    }

    /// Record a message dropped after its last attempt.
    pub fn message_dropped(topic: &str) {
        counter!(names::MESSAGES_DROPPED_TOTAL, "topic" => topic.to_string()).increment(1);
    }

    /// Record a handler outliving its deadline.
    pub fn deadline_exceeded(topic: &str) {
        counter!(names::HANDLER_DEADLINES_EXCEEDED_TOTAL, "topic" => topic.to_string()).increment(1);
    }

    /// Record a consumer starting.
    pub fn consumer_started() {
        gauge!(names::CONSUMERS_ACTIVE).increment(1.0);
    }

    /// Record a consumer stopping.
    pub fn consumer_stopped() {
        gauge!(names::CONSUMERS_ACTIVE).decrement(1.0);
    }
}
