//! Device health library for the cloud network-management dashboard
//!
//! This crate provides the core functionality for:
//! - Bounded-retry access to the dashboard API
//! - Building a per-cycle device inventory index
//! - Collecting uplink/HA, appliance performance and channel utilization families
//! - Flattening joined records into metric events and reporting them per organization
//! - Health checks and observability

pub mod api;
pub mod collector;
pub mod error;
pub mod event;
pub mod health;
pub mod inventory;
pub mod observability;
pub mod report;

pub use error::{ApiError, CollectError, FetchError};
pub use event::MetricEvent;
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, PassHealth,
    ReadinessResponse,
};
pub use inventory::{Device, DeviceIndex, Serial};
pub use observability::{AgentMetrics, StructuredLogger};
pub use report::{report_metrics_for_organization, OrganizationBatch, ReportSink};
