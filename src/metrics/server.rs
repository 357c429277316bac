//! Prometheus metrics endpoint.
//!
//! Exposes `/metrics` in the Prometheus text format plus a `/health` probe.

use axum::{Extension, Router, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use snafu::prelude::*;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::error::{MetricsError, PrometheusInitSnafu};

/// Install the Prometheus recorder and start the HTTP endpoint in the
/// background.
///
/// # Example
///
/// ```ignore
/// use std::net::SocketAddr;
/// use spillway::metrics;
///
/// let address: SocketAddr = "0.0.0.0:9090".parse().unwrap();
/// metrics::init(address).expect("Failed to initialize metrics");
/// ```
pub fn init(address: SocketAddr) -> Result<(), MetricsError> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context(PrometheusInitSnafu)?;

    tokio::spawn(run_server(address, handle));

    Ok(())
}

/// Serve the metrics and health routes. Bind failures are logged rather
/// than propagated; the daemon keeps running without the endpoint.
async fn run_server(address: SocketAddr, handle: PrometheusHandle) {
    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .layer(Extension(handle));

    let listener = match TcpListener::bind(address).await {
        Ok(listener) => listener,
        Err(err) => {
            error!("Failed to bind metrics server to {}: {}", address, err);
            return;
        }
    };
    info!("Metrics endpoint listening on {}", address);

    if let Err(err) = axum::serve(listener, app).await {
        error!("Metrics server error: {}", err);
    }
}

async fn metrics_handler(Extension(handle): Extension<PrometheusHandle>) -> String {
    handle.render()
}

async fn health_handler() -> &'static str {
    "ok\n"
}
