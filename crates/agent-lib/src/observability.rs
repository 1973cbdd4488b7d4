//! Observability infrastructure for the device health agent
//!
//! Provides:
//! - Prometheus metrics (family latency, emitted events, failures, retries, inventory size)
//! - Structured JSON logging with tracing

use crate::collector::Family;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec,
    register_int_gauge_vec, HistogramVec, IntCounter, IntCounterVec, IntGaugeVec,
};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{info, warn};

/// Histogram buckets for family collection latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<AgentMetricsInner> = OnceLock::new();

struct AgentMetricsInner {
    collection_latency_seconds: HistogramVec,
    events_emitted: IntCounterVec,
    family_errors: IntCounterVec,
    networks_skipped: IntCounter,
    http_retries: IntCounter,
    devices_in_inventory: IntGaugeVec,
    cycles_completed: IntCounter,
}

impl AgentMetricsInner {
    fn new() -> Self {
        Self {
            collection_latency_seconds: register_histogram_vec!(
                "device_health_collection_latency_seconds",
                "Time spent collecting one metric family for an organization",
                &["family"],
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register collection_latency_seconds"),

            events_emitted: register_int_counter_vec!(
                "device_health_events_emitted_total",
                "Metric events handed to the report sink",
                &["family"]
            )
            .expect("Failed to register events_emitted"),

            family_errors: register_int_counter_vec!(
                "device_health_family_errors_total",
                "Family collections aborted by an API failure",
                &["family"]
            )
            .expect("Failed to register family_errors"),

            networks_skipped: register_int_counter!(
                "device_health_networks_skipped_total",
                "Networks skipped because channel utilization is unsupported"
            )
            .expect("Failed to register networks_skipped"),

            http_retries: register_int_counter!(
                "device_health_http_retries_total",
                "Dashboard requests retried after a rate limit or server error"
            )
            .expect("Failed to register http_retries"),

            devices_in_inventory: register_int_gauge_vec!(
                "device_health_devices_in_inventory",
                "Devices in the last inventory fetched for an organization",
                &["organization_id"]
            )
            .expect("Failed to register devices_in_inventory"),

            cycles_completed: register_int_counter!(
                "device_health_cycles_completed_total",
                "Collection passes over all configured organizations"
            )
            .expect("Failed to register cycles_completed"),
        }
    }
}

/// Agent metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share the
/// same underlying metrics.
#[derive(Clone)]
pub struct AgentMetrics {
    _private: (),
}

impl Default for AgentMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(AgentMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &AgentMetricsInner {
        GLOBAL_METRICS.get_or_init(AgentMetricsInner::new)
    }

    pub fn observe_collection_latency(&self, family: Family, elapsed: Duration) {
        self.inner()
            .collection_latency_seconds
            .with_label_values(&[family.as_str()])
            .observe(elapsed.as_secs_f64());
    }

    pub fn inc_events_emitted(&self, family: Family, count: u64) {
        self.inner()
            .events_emitted
            .with_label_values(&[family.as_str()])
            .inc_by(count);
    }

    pub fn inc_family_errors(&self, family: Family) {
        self.inner()
            .family_errors
            .with_label_values(&[family.as_str()])
            .inc();
    }

    pub fn inc_networks_skipped(&self) {
        self.inner().networks_skipped.inc();
    }

    pub fn inc_http_retries(&self) {
        self.inner().http_retries.inc();
    }

    /// Inventory size of the organization's latest cycle
    pub fn set_devices_in_inventory(&self, organization_id: &str, count: usize) {
        self.inner()
            .devices_in_inventory
            .with_label_values(&[organization_id])
            .set(count as i64);
    }

    pub fn inc_cycles_completed(&self) {
        self.inner().cycles_completed.inc();
    }
}

/// Structured logger for agent events
///
/// Every line carries an `event` field so log pipelines can filter on it.
#[derive(Clone)]
pub struct StructuredLogger {
    agent_name: String,
}

impl StructuredLogger {
    pub fn new(agent_name: impl Into<String>) -> Self {
        Self {
            agent_name: agent_name.into(),
        }
    }

    /// Log agent startup
    pub fn log_startup(&self, version: &str, organizations: &[String], families: &[Family]) {
        let families: Vec<&str> = families.iter().map(Family::as_str).collect();
        info!(
            event = "agent_started",
            agent = %self.agent_name,
            agent_version = %version,
            organizations = ?organizations,
            families = ?families,
            "Device health agent started"
        );
    }

    /// Log agent shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "agent_shutdown",
            agent = %self.agent_name,
            reason = %reason,
            "Device health agent shutting down"
        );
    }

    /// Log the end of one organization's cycle
    pub fn log_cycle_completed(
        &self,
        organization_id: &str,
        devices: usize,
        events: usize,
        failed_families: usize,
        elapsed: Duration,
    ) {
        info!(
            event = "cycle_completed",
            agent = %self.agent_name,
            organization_id = %organization_id,
            devices = devices,
            events = events,
            failed_families = failed_families,
            elapsed_ms = elapsed.as_millis() as u64,
            "Collection cycle completed"
        );
    }

    /// Log a family aborted for an organization
    pub fn log_family_failed(&self, organization_id: &str, family: Family, error: &str) {
        warn!(
            event = "family_failed",
            agent = %self.agent_name,
            organization_id = %organization_id,
            family = %family,
            error = %error,
            "Metric family collection failed"
        );
    }

    /// Log an inventory failure that stops the organization's cycle
    pub fn log_inventory_failed(&self, organization_id: &str, error: &str) {
        warn!(
            event = "inventory_failed",
            agent = %self.agent_name,
            organization_id = %organization_id,
            error = %error,
            "Inventory fetch failed, skipping organization"
        );
    }
}
