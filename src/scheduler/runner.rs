use crate::collector::discovery::discover_streams;
use crate::collector::stream_collector::StreamCollector;
use crate::config::Config;
use crate::connection::MonitoredConnection;
use crate::error::StoreError;
use crate::metrics::registry::MetricsRegistry;
use crate::metrics::sink::MetricSink;
use async_trait::async_trait;
use futures::StreamExt;
use std::pin::pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument, warn};

/// Waits between collection cycles.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Result of one pass over every configured server.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub servers_ok: usize,
    pub connection_errors: usize,
    pub streams_collected: usize,
    pub stream_errors: usize,
}

impl CycleReport {
    /// At least one server answered, or there was nothing to poll.
    pub const fn any_server_reached(&self) -> bool {
        self.servers_ok > 0 || self.connection_errors == 0
    }
}

#[derive(Debug, Default)]
struct ServerReport {
    streams_collected: usize,
    stream_errors: usize,
    connection_error: Option<StoreError>,
}

/// Drives periodic collection across all configured servers.
pub struct Scheduler {
    connections: Vec<MonitoredConnection>,
    registry: Arc<MetricsRegistry>,
    scan_count: usize,
    interval: Duration,
    sleeper: Arc<dyn Sleeper>,
}

impl Scheduler {
    pub fn new(
        connections: Vec<MonitoredConnection>,
        registry: Arc<MetricsRegistry>,
        config: &Config,
    ) -> Self {
        Self {
            connections,
            registry,
            scan_count: config.scan_count,
            interval: config.sleep_interval,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    #[cfg(test)]
    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Run cycles until shutdown is signalled. A shutdown arriving mid-cycle
    /// takes effect once that cycle has finished.
    #[instrument(skip(self, shutdown), fields(servers = self.connections.len()))]
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        info!(interval = ?self.interval, "Starting collection loop");

        loop {
            self.run_cycle().await;

            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    info!("Received shutdown signal");
                    break;
                }
                () = self.sleeper.sleep(self.interval) => {}
            }
        }

        info!("Collection loop stopped");
    }

    /// Visit every server once, in configuration order.
    pub async fn run_cycle(&self) -> CycleReport {
        let start = Instant::now();
        let mut report = CycleReport::default();

        for conn in &self.connections {
            let server = self.collect_server(conn).await;
            report.streams_collected += server.streams_collected;
            report.stream_errors += server.stream_errors;

            match server.connection_error {
                None => {
                    report.servers_ok += 1;
                    self.registry.mark_server_updated(conn.label());
                }
                Some(e) => {
                    report.connection_errors += 1;
                    self.registry.mark_server_failed(conn.label());
                    error!(
                        redis_server = %conn.label(),
                        error = %e,
                        streams_collected = server.streams_collected,
                        "Lost connection to Redis server, skipping it for this cycle"
                    );
                }
            }
        }

        #[allow(clippy::cast_possible_truncation)]
        let elapsed_ms = start.elapsed().as_millis() as u64;
        self.registry.set_scrape_duration_ms(elapsed_ms);
        self.registry.set_healthy(report.any_server_reached());

        let purged = self.registry.purge_expired();
        if purged > 0 {
            debug!(purged, "Dropped expired series");
        }
        self.registry.finish_cycle();

        info!(
            elapsed_ms,
            servers_ok = report.servers_ok,
            connection_errors = report.connection_errors,
            streams = report.streams_collected,
            stream_errors = report.stream_errors,
            "Collection cycle completed"
        );

        report
    }

    #[instrument(skip(self, conn), fields(redis_server = %conn.label()))]
    async fn collect_server(&self, conn: &MonitoredConnection) -> ServerReport {
        let sink: Arc<dyn MetricSink> = self.registry.clone();
        let collector = StreamCollector::new(Arc::clone(&conn.store), sink, conn.label());
        let mut report = ServerReport::default();

        let mut streams = pin!(discover_streams(conn.store.as_ref(), self.scan_count));
        while let Some(next) = streams.next().await {
            let stream = match next {
                Ok(stream) => stream,
                Err(e) => {
                    report.connection_error = Some(e);
                    break;
                }
            };

            match collector.collect(&stream).await {
                Ok(outcome) => {
                    report.streams_collected += 1;
                    if let Some(e) = outcome.group_error {
                        report.stream_errors += 1;
                        if e.source.is_connection_error() {
                            report.connection_error = Some(e.source);
                            break;
                        }
                    }
                }
                Err(e) if e.source.is_connection_error() => {
                    report.connection_error = Some(e.source);
                    break;
                }
                Err(e) => {
                    warn!(
                        stream = %e.stream,
                        step = %e.step,
                        error = %e.source,
                        "Error collecting stream length"
                    );
                    report.stream_errors += 1;
                }
            }
        }

        report
    }
}
