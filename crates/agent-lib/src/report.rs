//! Reporting of flattened metric events
//!
//! Collectors hand their batches to `report_metrics_for_organization`, which
//! tags them with the organization and passes them to a `ReportSink`.

use crate::collector::Family;
use crate::event::MetricEvent;
use crate::observability::AgentMetrics;
use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Destination for metric batches; delivery is not acknowledged
#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn report(&self, organization_id: &str, events: Vec<MetricEvent>);
}

/// Report one family's batch for an organization
pub async fn report_metrics_for_organization(
    sink: &dyn ReportSink,
    organization_id: &str,
    family: Family,
    events: Vec<MetricEvent>,
) {
    debug!(
        organization_id = %organization_id,
        family = %family,
        events = events.len(),
        "Reporting metric batch"
    );
    AgentMetrics::new().inc_events_emitted(family, events.len() as u64);
    sink.report(organization_id, events).await;
}

/// A batch of events tagged with its organization
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrganizationBatch {
    pub organization_id: String,
    pub events: Vec<MetricEvent>,
}

/// Sink that forwards batches over an mpsc channel
#[derive(Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<OrganizationBatch>,
}

impl ChannelSink {
    pub fn new(buffer_size: usize) -> (Self, mpsc::Receiver<OrganizationBatch>) {
        let (tx, rx) = mpsc::channel(buffer_size.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait]
impl ReportSink for ChannelSink {
    async fn report(&self, organization_id: &str, events: Vec<MetricEvent>) {
        let batch = OrganizationBatch {
            organization_id: organization_id.to_string(),
            events,
        };
        if let Err(e) = self.tx.send(batch).await {
            warn!(error = %e, "Failed to send metric batch to channel");
        }
    }
}

/// Sink that writes every event as a structured log line
#[derive(Debug, Clone, Default)]
pub struct LogSink;

#[async_trait]
impl ReportSink for LogSink {
    async fn report(&self, organization_id: &str, events: Vec<MetricEvent>) {
        for event in events {
            match serde_json::to_string(&event) {
                Ok(fields) => info!(
                    target: "device_health::events",
                    organization_id = %organization_id,
                    fields = %fields,
                    "metric event"
                ),
                Err(e) => warn!(error = %e, "Failed to serialize metric event"),
            }
        }
    }
}
