//! Collection loop
//!
//! Runs a cycle for every configured organization, then sleeps for the
//! configured interval plus jitter until shutdown is signalled.

use super::cycle::{FamilyOutcome, Pipeline};
use super::{
    ChannelUtilizationCollector, Family, FamilyCollector, PerformanceScoreCollector,
    UplinkCollector,
};
use crate::api::DashboardApi;
use crate::health::{components, ComponentHealth, HealthRegistry, PassHealth};
use crate::observability::{AgentMetrics, StructuredLogger};
use crate::report::ReportSink;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Configuration for the collection loop
#[derive(Debug, Clone)]
pub struct CollectionConfig {
    /// Pause between passes (default: 300 seconds)
    pub interval: Duration,
    /// Maximum jitter added to the interval (default: 5 seconds)
    pub jitter: Duration,
    /// Organizations collected on every pass
    pub organization_ids: Vec<String>,
    /// Enabled families (default: all)
    pub families: Vec<Family>,
    /// Concurrent per-entity fetches within a family (default: 4)
    pub concurrency: usize,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            jitter: Duration::from_secs(5),
            organization_ids: Vec::new(),
            families: Family::ALL.to_vec(),
            concurrency: 4,
        }
    }
}

/// Periodically collects every organization through a `Pipeline`
pub struct CollectionLoop {
    pipeline: Pipeline,
    config: CollectionConfig,
    health: Option<HealthRegistry>,
    metrics: AgentMetrics,
}

impl CollectionLoop {
    pub fn new(pipeline: Pipeline, config: CollectionConfig) -> Self {
        Self {
            pipeline,
            config,
            health: None,
            metrics: AgentMetrics::new(),
        }
    }

    /// Report component status and completed passes to a health registry
    pub fn with_health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    pub fn config(&self) -> &CollectionConfig {
        &self.config
    }

    /// Run until a shutdown signal arrives; the first pass starts immediately
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            organizations = self.config.organization_ids.len(),
            families = ?self.pipeline.families(),
            "Starting collection loop"
        );

        let mut delay = Duration::ZERO;
        loop {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    let start = Instant::now();
                    let results = self.collect_all().await;

                    debug!(
                        organizations = results.organizations,
                        failed_organizations = results.failed_organizations,
                        events = results.events,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "Collection pass complete"
                    );

                    delay = self.next_delay();
                }
                _ = shutdown.recv() => {
                    info!("Shutting down collection loop");
                    break;
                }
            }
        }
    }

    /// Interval plus jitter
    fn next_delay(&self) -> Duration {
        let jitter_ms = rand_jitter(self.config.jitter.as_millis() as u64);
        self.config.interval + Duration::from_millis(jitter_ms)
    }

    /// One pass over every organization, one after another.
    ///
    /// Each health component ends the pass with the worst status any
    /// organization produced for it, so a failure in one organization is
    /// not masked by a later success.
    pub async fn collect_all(&self) -> CollectionResults {
        let mut results = CollectionResults::default();
        let mut pass = PassHealth::new();

        for organization_id in &self.config.organization_ids {
            results.organizations += 1;
            match self.pipeline.run_organization(organization_id).await {
                Ok(summary) => {
                    results.events += summary.events();
                    results.failed_families += summary.failed_families();

                    pass.record(components::INVENTORY, ComponentHealth::healthy());
                    for outcome in &summary.outcomes {
                        let health = match outcome {
                            FamilyOutcome::Reported { .. } => ComponentHealth::healthy(),
                            FamilyOutcome::Failed { error, .. } => ComponentHealth::degraded(
                                format!("organization {}: {}", organization_id, error),
                            ),
                        };
                        pass.record(outcome.family().component(), health);
                    }
                }
                Err(e) => {
                    results.failed_organizations += 1;
                    pass.record(
                        components::INVENTORY,
                        ComponentHealth::unhealthy(format!(
                            "organization {}: {}",
                            organization_id, e
                        )),
                    );
                    warn!(
                        organization_id = %organization_id,
                        error = %e,
                        "Organization cycle aborted"
                    );
                }
            }
        }

        self.metrics.inc_cycles_completed();
        if let Some(health) = &self.health {
            health.record_pass(pass).await;
        }

        results
    }
}

/// Counts from one pass over all organizations
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CollectionResults {
    pub organizations: usize,
    pub failed_organizations: usize,
    pub failed_families: usize,
    pub events: usize,
}

/// Generate a random jitter value between 0 and max_ms
fn rand_jitter(max_ms: u64) -> u64 {
    if max_ms == 0 {
        return 0;
    }

    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;

    now % max_ms
}

/// Builder wiring the API, sink and collectors into a `CollectionLoop`
pub struct CollectionLoopBuilder {
    api: Option<DashboardApi>,
    sink: Option<Arc<dyn ReportSink>>,
    collectors: Vec<Arc<dyn FamilyCollector>>,
    health: Option<HealthRegistry>,
    logger: Option<StructuredLogger>,
    config: CollectionConfig,
}

impl CollectionLoopBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            api: None,
            sink: None,
            collectors: Vec::new(),
            health: None,
            logger: None,
            config: CollectionConfig::default(),
        }
    }

    pub fn api(mut self, api: DashboardApi) -> Self {
        self.api = Some(api);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn organizations<I, S>(mut self, organization_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.organization_ids = organization_ids.into_iter().map(Into::into).collect();
        self
    }

    /// Restrict collection to these families
    pub fn families(mut self, families: Vec<Family>) -> Self {
        self.config.families = families;
        self
    }

    /// Use a custom collector instead of the ones derived from `families`
    pub fn collector(mut self, collector: Arc<dyn FamilyCollector>) -> Self {
        self.collectors.push(collector);
        self
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.config.concurrency = concurrency.max(1);
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.config.interval = interval;
        self
    }

    pub fn jitter(mut self, jitter: Duration) -> Self {
        self.config.jitter = jitter;
        self
    }

    pub fn health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    pub fn logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Build the collection loop
    pub fn build(self) -> Result<CollectionLoop> {
        let api = self
            .api
            .ok_or_else(|| anyhow::anyhow!("Dashboard API is required"))?;
        let sink = self
            .sink
            .ok_or_else(|| anyhow::anyhow!("Report sink is required"))?;
        if self.config.organization_ids.is_empty() {
            anyhow::bail!("At least one organization is required");
        }

        let mut config = self.config;
        let collectors = if self.collectors.is_empty() {
            if config.families.is_empty() {
                anyhow::bail!("At least one metric family is required");
            }
            config.families = Family::ALL
                .into_iter()
                .filter(|family| config.families.contains(family))
                .collect();
            family_collectors(&api, &config.families, config.concurrency)
        } else {
            config.families = self.collectors.iter().map(|c| c.family()).collect();
            self.collectors
        };

        let mut pipeline = Pipeline::new(api, collectors, sink);
        if let Some(logger) = self.logger {
            pipeline = pipeline.with_logger(logger);
        }

        let collection_loop = CollectionLoop::new(pipeline, config);
        Ok(match self.health {
            Some(health) => collection_loop.with_health(health),
            None => collection_loop,
        })
    }
}

impl Default for CollectionLoopBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Collectors for the enabled families, always in uplinks, performance,
/// channel utilization order
fn family_collectors(
    api: &DashboardApi,
    families: &[Family],
    concurrency: usize,
) -> Vec<Arc<dyn FamilyCollector>> {
    Family::ALL
        .iter()
        .filter(|family| families.contains(family))
        .map(|family| -> Arc<dyn FamilyCollector> {
            match family {
                Family::Uplinks => Arc::new(UplinkCollector::new(api.clone())),
                Family::PerformanceScore => {
                    Arc::new(PerformanceScoreCollector::new(api.clone(), concurrency))
                }
                Family::ChannelUtilization => {
                    Arc::new(ChannelUtilizationCollector::new(api.clone(), concurrency))
                }
            }
        })
        .collect()
}
