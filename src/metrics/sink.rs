use crate::metrics::definitions::{
    HELP_CONSUMER_IDLE_SECONDS, HELP_GROUP_CONSUMERS, HELP_GROUP_PENDING_MESSAGES,
    HELP_STREAM_GROUPS, HELP_STREAM_LENGTH, LABEL_CONSUMER, LABEL_GROUP, LABEL_REDIS_SERVER,
    LABEL_STREAM, METRIC_CONSUMER_IDLE_SECONDS, METRIC_GROUP_CONSUMERS,
    METRIC_GROUP_PENDING_MESSAGES, METRIC_STREAM_GROUPS, METRIC_STREAM_LENGTH,
};
use crate::metrics::types::{Labels, MetricPoint};

/// Destination for gauge values produced by a collection cycle.
///
/// Writing a point replaces any earlier value with the same name and label
/// set. Implementations must accept concurrent writers.
pub trait MetricSink: Send + Sync {
    fn set_gauge(&self, point: MetricPoint);
}

pub fn stream_labels(stream: &str, server: &str) -> Labels {
    let mut labels = Labels::new();
    labels.insert(LABEL_STREAM.to_string(), stream.to_string());
    labels.insert(LABEL_REDIS_SERVER.to_string(), server.to_string());
    labels
}

pub fn group_labels(stream: &str, server: &str, group: &str) -> Labels {
    let mut labels = stream_labels(stream, server);
    labels.insert(LABEL_GROUP.to_string(), group.to_string());
    labels
}

pub fn consumer_labels(stream: &str, server: &str, group: &str, consumer: &str) -> Labels {
    let mut labels = group_labels(stream, server, group);
    labels.insert(LABEL_CONSUMER.to_string(), consumer.to_string());
    labels
}

#[allow(clippy::cast_precision_loss)]
pub fn stream_length_point(stream: &str, server: &str, length: u64) -> MetricPoint {
    MetricPoint::gauge(
        METRIC_STREAM_LENGTH,
        stream_labels(stream, server),
        length as f64,
        HELP_STREAM_LENGTH,
    )
}

#[allow(clippy::cast_precision_loss)]
pub fn stream_groups_point(stream: &str, server: &str, groups: usize) -> MetricPoint {
    MetricPoint::gauge(
        METRIC_STREAM_GROUPS,
        stream_labels(stream, server),
        groups as f64,
        HELP_STREAM_GROUPS,
    )
}

#[allow(clippy::cast_precision_loss)]
pub fn group_pending_point(stream: &str, server: &str, group: &str, pending: u64) -> MetricPoint {
    MetricPoint::gauge(
        METRIC_GROUP_PENDING_MESSAGES,
        group_labels(stream, server, group),
        pending as f64,
        HELP_GROUP_PENDING_MESSAGES,
    )
}

#[allow(clippy::cast_precision_loss)]
pub fn group_consumers_point(
    stream: &str,
    server: &str,
    group: &str,
    consumers: usize,
) -> MetricPoint {
    MetricPoint::gauge(
        METRIC_GROUP_CONSUMERS,
        group_labels(stream, server, group),
        consumers as f64,
        HELP_GROUP_CONSUMERS,
    )
}

pub fn consumer_idle_point(
    stream: &str,
    server: &str,
    group: &str,
    consumer: &str,
    idle_seconds: f64,
) -> MetricPoint {
    MetricPoint::gauge(
        METRIC_CONSUMER_IDLE_SECONDS,
        consumer_labels(stream, server, group, consumer),
        idle_seconds,
        HELP_CONSUMER_IDLE_SECONDS,
    )
}
