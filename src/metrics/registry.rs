use crate::metrics::definitions::{
    HELP_LAST_UPDATE_TIMESTAMP, HELP_SCRAPE_DURATION_SECONDS, HELP_UP, LABEL_REDIS_SERVER,
    METRIC_LAST_UPDATE_TIMESTAMP, METRIC_SCRAPE_DURATION_SECONDS, METRIC_UP,
};
use crate::metrics::sink::MetricSink;
use crate::metrics::types::{Labels, MetricPoint};
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Series identity: metric name plus its rendered, sorted label set.
type SeriesKey = (String, String);

#[derive(Debug, Clone)]
struct Series {
    point: MetricPoint,
    updated_at: Instant,
}

/// Process-wide gauge store read by the HTTP exposition.
///
/// Series are keyed by name and label set and keep their last written value
/// until overwritten. With a `series_ttl`, series not refreshed within the
/// TTL are hidden from rendering and dropped by [`MetricsRegistry::purge_expired`].
pub struct MetricsRegistry {
    series: DashMap<SeriesKey, Series>,
    last_update_timestamp: DashMap<String, u64>, // Unix timestamp in seconds, per server
    healthy: AtomicBool,
    last_scrape_duration_ms: AtomicU64,
    cycles_completed: AtomicU64,
    series_ttl: Option<Duration>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::with_series_ttl(None)
    }

    pub fn with_series_ttl(series_ttl: Option<Duration>) -> Self {
        Self {
            series: DashMap::new(),
            last_update_timestamp: DashMap::new(),
            healthy: AtomicBool::new(true),
            last_scrape_duration_ms: AtomicU64::new(0),
            cycles_completed: AtomicU64::new(0),
            series_ttl,
        }
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }

    pub fn set_scrape_duration_ms(&self, duration_ms: u64) {
        self.last_scrape_duration_ms
            .store(duration_ms, Ordering::SeqCst);
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn get_scrape_duration_seconds(&self) -> f64 {
        self.last_scrape_duration_ms.load(Ordering::SeqCst) as f64 / 1000.0
    }

    /// Record that `server` was collected successfully just now.
    pub fn mark_server_updated(&self, server: &str) {
        let unix_timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs());
        self.last_update_timestamp
            .insert(server.to_string(), unix_timestamp);
    }

    /// Forget the last-success timestamp of a server that failed this cycle.
    pub fn mark_server_failed(&self, server: &str) {
        self.last_update_timestamp.remove(server);
    }

    pub fn finish_cycle(&self) {
        self.cycles_completed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn cycles_completed(&self) -> u64 {
        self.cycles_completed.load(Ordering::SeqCst)
    }

    /// Servers whose most recent cycle succeeded, with the Unix time of that cycle.
    pub fn server_updates(&self) -> BTreeMap<String, u64> {
        self.last_update_timestamp
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }

    pub fn series_count(&self) -> usize {
        self.series.len()
    }

    /// Current value of one series, ignoring expiry.
    #[cfg(test)]
    pub fn get(&self, name: &str, labels: &Labels) -> Option<f64> {
        self.series
            .get(&(name.to_string(), render_labels(labels)))
            .map(|s| s.point.value.as_f64())
    }

    /// Drop series older than the TTL. Returns the number removed.
    pub fn purge_expired(&self) -> usize {
        let Some(ttl) = self.series_ttl else {
            return 0;
        };
        let now = Instant::now();
        let before = self.series.len();
        self.series
            .retain(|_, series| now.duration_since(series.updated_at) <= ttl);
        before.saturating_sub(self.series.len())
    }

    fn is_expired(&self, series: &Series, now: Instant) -> bool {
        self.series_ttl
            .is_some_and(|ttl| now.duration_since(series.updated_at) > ttl)
    }

    pub fn render_prometheus(&self) -> String {
        self.render_prometheus_with_staleness_check(true)
    }

    /// Render Prometheus metrics, optionally filtering out expired series
    pub fn render_prometheus_with_staleness_check(&self, filter_stale: bool) -> String {
        let mut output = String::new();
        let now = Instant::now();

        // Group by metric name, then by rendered labels, for stable output
        let mut by_name: BTreeMap<String, BTreeMap<String, MetricPoint>> = BTreeMap::new();
        for entry in &self.series {
            if filter_stale && self.is_expired(entry.value(), now) {
                continue;
            }
            let (name, labels) = entry.key();
            by_name
                .entry(name.clone())
                .or_default()
                .insert(labels.clone(), entry.value().point.clone());
        }

        for (name, series) in &by_name {
            let Some(first) = series.values().next() else {
                continue;
            };

            // Output HELP and TYPE once per metric
            output.push_str(format!("# HELP {name} {}\n", first.help).as_str());
            output.push_str(format!("# TYPE {name} {}\n", first.metric_type.as_str()).as_str());

            for (labels_str, point) in series {
                output.push_str(format!("{name}{labels_str} {}\n", point.value.as_f64()).as_str());
            }
        }

        // Add scrape duration metric
        let scrape_duration = self.get_scrape_duration_seconds();
        output.push_str(
            format!("# HELP {METRIC_SCRAPE_DURATION_SECONDS} {HELP_SCRAPE_DURATION_SECONDS}\n")
                .as_str(),
        );
        output.push_str(format!("# TYPE {METRIC_SCRAPE_DURATION_SECONDS} gauge\n").as_str());
        output
            .push_str(format!("{METRIC_SCRAPE_DURATION_SECONDS} {scrape_duration:.6}\n").as_str());

        // Add exporter health metric
        output.push_str(format!("# HELP {METRIC_UP} {HELP_UP}\n").as_str());
        output.push_str(format!("# TYPE {METRIC_UP} gauge\n").as_str());
        output.push_str(format!("{} {}\n", METRIC_UP, i32::from(self.is_healthy())).as_str());

        // Add last update timestamp metric per server
        let updates = self.server_updates();
        if !updates.is_empty() {
            output.push_str(
                format!("# HELP {METRIC_LAST_UPDATE_TIMESTAMP} {HELP_LAST_UPDATE_TIMESTAMP}\n")
                    .as_str(),
            );
            output.push_str(format!("# TYPE {METRIC_LAST_UPDATE_TIMESTAMP} gauge\n").as_str());
            for (server, timestamp) in updates {
                output.push_str(
                    format!(
                        "{METRIC_LAST_UPDATE_TIMESTAMP}{{{LABEL_REDIS_SERVER}=\"{}\"}} {timestamp}\n",
                        escape_label_value(&server)
                    )
                    .as_str(),
                );
            }
        }

        output
    }
}

impl MetricSink for MetricsRegistry {
    fn set_gauge(&self, point: MetricPoint) {
        let key = (point.name.clone(), render_labels(&point.labels));
        self.series.insert(
            key,
            Series {
                point,
                updated_at: Instant::now(),
            },
        );
    }
}

fn render_labels(labels: &Labels) -> String {
    if labels.is_empty() {
        return String::new();
    }

    let mut pairs: Vec<_> = labels.iter().collect();
    pairs.sort_by_key(|(k, _)| *k);

    let label_str = pairs
        .into_iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label_value(v)))
        .collect::<Vec<_>>()
        .join(",");

    format!("{{{label_str}}}")
}

fn escape_label_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}
