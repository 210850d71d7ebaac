use crate::error::{ExporterError, Result};
use crate::export::prometheus::PrometheusExporter;
use crate::metrics::registry::MetricsRegistry;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::info;

#[derive(Clone)]
struct AppState {
    prometheus: PrometheusExporter,
    registry: Arc<MetricsRegistry>,
}

pub struct HttpServer;

/// A listener that is already bound, so the port is known to be ours before
/// collection starts.
pub struct BoundServer {
    listener: TcpListener,
    router: Router,
}

impl HttpServer {
    pub async fn bind(
        host: &str,
        port: u16,
        prometheus: PrometheusExporter,
        registry: Arc<MetricsRegistry>,
    ) -> Result<BoundServer> {
        let listener = TcpListener::bind((host, port))
            .await
            .map_err(|e| ExporterError::Http(format!("Cannot bind {host}:{port}: {e}")))?;

        Ok(BoundServer {
            listener,
            router: router(AppState {
                prometheus,
                registry,
            }),
        })
    }
}

impl BoundServer {
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub async fn serve(self, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
        info!("Starting HTTP server");

        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                info!("HTTP server shutting down");
            })
            .await
            .map_err(|e| ExporterError::Http(e.to_string()))?;

        Ok(())
    }
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/status", get(status_handler))
        .route("/", get(root_handler))
        .with_state(state)
}

async fn metrics_handler(State(state): State<AppState>) -> Response {
    let metrics = state.prometheus.render_metrics();
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        metrics,
    )
        .into_response()
}

async fn health_handler(State(state): State<AppState>) -> Response {
    if state.registry.is_healthy() {
        (StatusCode::OK, "OK").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "Unhealthy").into_response()
    }
}

async fn ready_handler(State(state): State<AppState>) -> Response {
    // Ready once the first collection cycle has finished
    if state.registry.cycles_completed() > 0 {
        (StatusCode::OK, "Ready").into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            "Not ready - first collection cycle still running",
        )
            .into_response()
    }
}

/// Response body for the /status endpoint.
#[derive(Serialize)]
struct StatusResponse {
    healthy: bool,
    cycles_completed: u64,
    series: usize,
    /// Last successful collection per server, as Unix seconds.
    servers: BTreeMap<String, u64>,
}

async fn status_handler(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        healthy: state.registry.is_healthy(),
        cycles_completed: state.registry.cycles_completed(),
        series: state.registry.series_count(),
        servers: state.registry.server_updates(),
    })
}

async fn root_handler() -> Response {
    let html = r#"<!DOCTYPE html>
<html>
<head><title>Redis Stream Exporter</title></head>
<body>
<h1>Redis Stream Exporter</h1>
<p><a href="/metrics">Metrics</a></p>
<p><a href="/health">Health</a></p>
<p><a href="/ready">Ready</a></p>
<p><a href="/status">Status</a></p>
</body>
</html>"#;

    (
        StatusCode::OK,
        [("content-type", "text/html; charset=utf-8")],
        html,
    )
        .into_response()
}
