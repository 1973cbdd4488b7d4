//! HTTP API for the device health agent
//!
//! - `/healthz` reports the `inventory`, `uplinks`, `performance` and
//!   `channel_utilization` components as left by the last collection pass.
//! - `/readyz` turns ready after startup and the first completed pass.
//! - `/metrics` exposes the collection counters in Prometheus text format.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use device_health_lib::{health::HealthRegistry, observability::AgentMetrics};
use prometheus::{Encoder, TextEncoder};
use std::sync::Arc;
use tracing::{info, warn};

/// State shared by the handlers
#[derive(Clone)]
pub struct AppState {
    /// Component status written by the collection loop
    pub health_registry: HealthRegistry,
    pub metrics: AgentMetrics,
}

impl AppState {
    pub fn new(health_registry: HealthRegistry, metrics: AgentMetrics) -> Self {
        Self {
            health_registry,
            metrics,
        }
    }
}

fn availability(ok: bool) -> StatusCode {
    if ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// Liveness. A family that failed in some organization only degrades the
/// agent and still answers 200; an organization whose inventory could not
/// be fetched makes `inventory` unhealthy and the answer 503.
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;
    (availability(health.status.is_operational()), Json(health))
}

/// Readiness. 503 with a reason until the agent has started and finished
/// one pass over every organization, and again while `inventory` is
/// unhealthy.
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;
    (availability(readiness.ready), Json(readiness))
}

/// Latency, emitted events, family errors, skipped networks, HTTP retries
/// and inventory sizes from the global registry
async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let content_type = encoder.format_type().to_string();
    let mut buffer = Vec::new();

    match encoder.encode(&prometheus::gather(), &mut buffer) {
        Ok(()) => (StatusCode::OK, [(header::CONTENT_TYPE, content_type)], buffer),
        Err(e) => {
            warn!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string())],
                e.to_string().into_bytes(),
            )
        }
    }
}

/// Router serving `/healthz`, `/readyz` and `/metrics`
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Serve health and metrics on every interface until the task is aborted
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "Serving health and metrics");

    axum::serve(listener, create_router(state)).await?;
    Ok(())
}
