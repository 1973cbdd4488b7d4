//! One collection cycle for an organization
//!
//! The inventory is fetched first and indexed by serial; every enabled
//! family then runs in order against that index. A failing family is
//! recorded and the cycle moves on; a failing inventory ends the cycle.
//! Component health is left to the loop, which sees every organization.

use super::{Family, FamilyCollector};
use crate::api::DashboardApi;
use crate::error::CollectError;
use crate::inventory::DeviceIndex;
use crate::observability::{AgentMetrics, StructuredLogger};
use crate::report::{report_metrics_for_organization, ReportSink};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::debug;

/// Result of one family within a cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FamilyOutcome {
    Reported { family: Family, events: usize },
    Failed { family: Family, error: String },
}

impl FamilyOutcome {
    pub fn family(&self) -> Family {
        match self {
            FamilyOutcome::Reported { family, .. } | FamilyOutcome::Failed { family, .. } => *family,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, FamilyOutcome::Failed { .. })
    }
}

/// What a cycle did for one organization
#[derive(Debug, Clone)]
pub struct CycleSummary {
    pub organization_id: String,
    /// Size of the inventory index
    pub devices: usize,
    pub outcomes: Vec<FamilyOutcome>,
}

impl CycleSummary {
    /// Total events reported across families
    pub fn events(&self) -> usize {
        self.outcomes
            .iter()
            .map(|outcome| match outcome {
                FamilyOutcome::Reported { events, .. } => *events,
                FamilyOutcome::Failed { .. } => 0,
            })
            .sum()
    }

    pub fn failed_families(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failed()).count()
    }
}

/// Inventory fetch plus the family collectors, wired to a sink
pub struct Pipeline {
    api: DashboardApi,
    collectors: Vec<Arc<dyn FamilyCollector>>,
    sink: Arc<dyn ReportSink>,
    logger: StructuredLogger,
    metrics: AgentMetrics,
}

impl Pipeline {
    pub fn new(
        api: DashboardApi,
        collectors: Vec<Arc<dyn FamilyCollector>>,
        sink: Arc<dyn ReportSink>,
    ) -> Self {
        Self {
            api,
            collectors,
            sink,
            logger: StructuredLogger::new(env!("CARGO_PKG_NAME")),
            metrics: AgentMetrics::new(),
        }
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    /// Families in the order they run
    pub fn families(&self) -> Vec<Family> {
        self.collectors.iter().map(|c| c.family()).collect()
    }

    /// Fetch the organization's devices and index them by serial
    pub async fn fetch_inventory(&self, organization_id: &str) -> Result<DeviceIndex, CollectError> {
        let raw = self
            .api
            .organization_devices(organization_id)
            .await
            .map_err(CollectError::Inventory)?;
        Ok(DeviceIndex::build(raw))
    }

    /// Run the inventory and every family for one organization
    pub async fn run_organization(&self, organization_id: &str) -> Result<CycleSummary, CollectError> {
        let start = Instant::now();

        let devices = match self.fetch_inventory(organization_id).await {
            Ok(devices) => devices,
            Err(e) => {
                self.logger.log_inventory_failed(organization_id, &e.to_string());
                return Err(e);
            }
        };
        self.metrics
            .set_devices_in_inventory(organization_id, devices.len());
        debug!(
            organization_id = %organization_id,
            devices = devices.len(),
            "Built device inventory"
        );

        let mut outcomes = Vec::with_capacity(self.collectors.len());
        for collector in &self.collectors {
            outcomes.push(self.run_family(collector.as_ref(), organization_id, &devices).await);
        }

        let summary = CycleSummary {
            organization_id: organization_id.to_string(),
            devices: devices.len(),
            outcomes,
        };
        self.logger.log_cycle_completed(
            organization_id,
            summary.devices,
            summary.events(),
            summary.failed_families(),
            start.elapsed(),
        );
        Ok(summary)
    }

    async fn run_family(
        &self,
        collector: &dyn FamilyCollector,
        organization_id: &str,
        devices: &DeviceIndex,
    ) -> FamilyOutcome {
        let family = collector.family();
        let start = Instant::now();
        let result = collector.collect(organization_id, devices).await;
        self.metrics.observe_collection_latency(family, start.elapsed());

        match result {
            Ok(events) => {
                let count = events.len();
                report_metrics_for_organization(self.sink.as_ref(), organization_id, family, events)
                    .await;
                FamilyOutcome::Reported {
                    family,
                    events: count,
                }
            }
            Err(e) => {
                let error = e.to_string();
                self.logger.log_family_failed(organization_id, family, &error);
                self.metrics.inc_family_errors(family);
                FamilyOutcome::Failed { family, error }
            }
        }
    }
}
