//! Device Health Agent
//!
//! Polls the dashboard API for every configured organization, flattens
//! uplink, performance and channel utilization data into metric events and
//! reports them, exposing health and Prometheus metrics over HTTP.

use anyhow::{Context, Result};
use device_health_agent::{api, config::AgentConfig};
use device_health_lib::{
    api::{DashboardApi, RetryingClient},
    collector::CollectionLoopBuilder,
    health::HealthRegistry,
    observability::{AgentMetrics, StructuredLogger},
    report::LogSink,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const AGENT_NAME: &str = env!("CARGO_PKG_NAME");
const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting device-health-agent");

    let config = AgentConfig::load()?;
    let organizations = config.organizations();
    let families = config.enabled_families()?;
    info!(
        base_url = %config.api_base_url,
        organizations = organizations.len(),
        "Agent configured"
    );

    let health_registry = HealthRegistry::new();
    health_registry.register_all().await;

    let metrics = AgentMetrics::new();

    let logger = StructuredLogger::new(AGENT_NAME);
    logger.log_startup(AGENT_VERSION, &organizations, &families);

    let client = RetryingClient::new(config.client_config())
        .context("failed to create dashboard client")?;
    let dashboard = DashboardApi::new(Arc::new(client), &config.api_base_url)
        .context("invalid dashboard base URL")?;

    let collection_loop = CollectionLoopBuilder::new()
        .api(dashboard)
        .sink(Arc::new(LogSink))
        .organizations(organizations)
        .families(families)
        .concurrency(config.concurrency)
        .interval(config.collection_interval())
        .jitter(config.jitter())
        .health(health_registry.clone())
        .logger(logger.clone())
        .build()?;

    let app_state = Arc::new(api::AppState::new(health_registry.clone(), metrics));

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let loop_handle = tokio::spawn(collection_loop.run(shutdown_rx));
    let api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    health_registry.set_started(true).await;

    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");

    let _ = shutdown_tx.send(());
    if let Err(e) = loop_handle.await {
        warn!(error = %e, "Collection loop task failed");
    }
    api_handle.abort();

    info!("Shutdown complete");
    Ok(())
}
