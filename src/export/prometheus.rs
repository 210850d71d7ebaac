use crate::metrics::registry::MetricsRegistry;
use std::sync::Arc;

/// Text exposition of the registry in the Prometheus format.
pub struct PrometheusExporter {
    registry: Arc<MetricsRegistry>,
}

impl PrometheusExporter {
    pub fn new(registry: Arc<MetricsRegistry>) -> Self {
        Self { registry }
    }

    pub fn render_metrics(&self) -> String {
        self.registry.render_prometheus()
    }
}

impl Clone for PrometheusExporter {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}
