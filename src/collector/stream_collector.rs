use crate::error::{QueryError, QueryStep};
use crate::metrics::sink::{
    MetricSink, consumer_idle_point, group_consumers_point, group_pending_point,
    stream_groups_point, stream_length_point,
};
use crate::store::StreamStore;
use std::sync::Arc;
use tracing::{debug, instrument, trace, warn};

/// Walks one stream's consumer-group hierarchy on one server and writes the
/// resulting gauges to the sink.
pub struct StreamCollector {
    store: Arc<dyn StreamStore>,
    sink: Arc<dyn MetricSink>,
    server_label: String,
}

/// What was collected for a stream whose length query succeeded.
#[derive(Debug)]
pub struct StreamOutcome {
    pub length: u64,
    pub groups: usize,
    pub consumers: usize,
    /// Set when the group/consumer walk stopped early. Metrics written before
    /// the failure are kept.
    pub group_error: Option<QueryError>,
}

impl StreamOutcome {
    #[cfg(test)]
    pub const fn is_complete(&self) -> bool {
        self.group_error.is_none()
    }
}

impl StreamCollector {
    pub fn new(
        store: Arc<dyn StreamStore>,
        sink: Arc<dyn MetricSink>,
        server_label: impl Into<String>,
    ) -> Self {
        Self {
            store,
            sink,
            server_label: server_label.into(),
        }
    }

    /// Collect all metrics for `stream`.
    ///
    /// A failed length query is returned as an error and nothing is written.
    /// Failures further down are logged and reported in
    /// [`StreamOutcome::group_error`] instead.
    #[instrument(skip(self), fields(redis_server = %self.server_label))]
    pub async fn collect(&self, stream: &str) -> Result<StreamOutcome, QueryError> {
        let length = self
            .store
            .stream_length(stream)
            .await
            .map_err(|e| QueryError::stream(stream, QueryStep::Length, e))?;
        self.sink
            .set_gauge(stream_length_point(stream, &self.server_label, length));

        let mut outcome = StreamOutcome {
            length,
            groups: 0,
            consumers: 0,
            group_error: None,
        };

        if let Err(e) = self.collect_groups(stream, &mut outcome).await {
            warn!(
                stream,
                group = ?e.group,
                step = %e.step,
                error = %e.source,
                "Error collecting metrics for stream"
            );
            outcome.group_error = Some(e);
        }

        debug!(
            length = outcome.length,
            groups = outcome.groups,
            consumers = outcome.consumers,
            "Collected stream"
        );
        Ok(outcome)
    }

    async fn collect_groups(
        &self,
        stream: &str,
        outcome: &mut StreamOutcome,
    ) -> Result<(), QueryError> {
        let server = self.server_label.as_str();

        let groups = self
            .store
            .consumer_groups(stream)
            .await
            .map_err(|e| QueryError::stream(stream, QueryStep::Groups, e))?;
        self.sink
            .set_gauge(stream_groups_point(stream, server, groups.len()));
        outcome.groups = groups.len();

        for group in &groups {
            let group_name = group.name.as_str();
            trace!(
                group = group_name,
                reported_pending = group.pending_count,
                reported_consumers = group.consumer_count,
                "Inspecting consumer group"
            );

            let pending = self
                .store
                .pending_summary(stream, group_name)
                .await
                .map_err(|e| QueryError::group(stream, group_name, QueryStep::Pending, e))?
                .count();
            self.sink
                .set_gauge(group_pending_point(stream, server, group_name, pending));

            let consumers = self
                .store
                .consumers(stream, group_name)
                .await
                .map_err(|e| QueryError::group(stream, group_name, QueryStep::Consumers, e))?;
            self.sink.set_gauge(group_consumers_point(
                stream,
                server,
                group_name,
                consumers.len(),
            ));

            for consumer in &consumers {
                self.sink.set_gauge(consumer_idle_point(
                    stream,
                    server,
                    group_name,
                    &consumer.name,
                    consumer.idle_seconds(),
                ));
            }
            outcome.consumers += consumers.len();
        }

        Ok(())
    }
}
