//! Health check infrastructure for the device health agent
//!
//! Tracks the inventory fetch and each metric family as components so
//! liveness and readiness probes reflect the last collection cycle.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Health status of a component, ordered from best to worst
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    /// Last collection succeeded
    Healthy,
    /// Last collection failed but other parts of the cycle still report
    Degraded,
    /// Nothing can be collected
    Unhealthy,
}

impl ComponentStatus {
    /// Returns true if the component is at least partially operational
    pub fn is_operational(&self) -> bool {
        matches!(self, ComponentStatus::Healthy | ComponentStatus::Degraded)
    }
}

/// Information about a component's health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

impl ComponentHealth {
    fn with_status(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }

    pub fn healthy() -> Self {
        Self::with_status(ComponentStatus::Healthy, None)
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Degraded, Some(message.into()))
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Unhealthy, Some(message.into()))
    }
}

/// Overall health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: HashMap<String, ComponentHealth>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_cycle_timestamp: Option<i64>,
}

impl HealthResponse {
    /// Worst status across all components
    pub fn compute_status(components: &HashMap<String, ComponentHealth>) -> ComponentStatus {
        let mut has_degraded = false;

        for health in components.values() {
            match health.status {
                ComponentStatus::Unhealthy => return ComponentStatus::Unhealthy,
                ComponentStatus::Degraded => has_degraded = true,
                ComponentStatus::Healthy => {}
            }
        }

        if has_degraded {
            ComponentStatus::Degraded
        } else {
            ComponentStatus::Healthy
        }
    }
}

/// Readiness response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Component names for health tracking
pub mod components {
    pub const INVENTORY: &str = "inventory";
    pub const UPLINKS: &str = "uplinks";
    pub const PERFORMANCE: &str = "performance";
    pub const CHANNEL_UTILIZATION: &str = "channel_utilization";

    /// Every component registered by the agent
    pub const ALL: [&str; 4] = [INVENTORY, UPLINKS, PERFORMANCE, CHANNEL_UTILIZATION];
}

/// Worst status per component across the organizations of one pass
#[derive(Debug, Default)]
pub struct PassHealth {
    components: HashMap<String, ComponentHealth>,
}

impl PassHealth {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep `health` unless the component already saw an equal or worse status
    pub fn record(&mut self, name: &str, health: ComponentHealth) {
        match self.components.get(name) {
            Some(current) if current.status >= health.status => {}
            _ => {
                self.components.insert(name.to_string(), health);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&ComponentHealth> {
        self.components.get(name)
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    components: HashMap<String, ComponentHealth>,
    started: bool,
    last_cycle_timestamp: Option<i64>,
}

/// Health registry shared by the collection loop and the HTTP API
#[derive(Debug, Clone, Default)]
pub struct HealthRegistry {
    state: Arc<RwLock<RegistryState>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component with initial healthy status
    pub async fn register(&self, name: &str) {
        let mut state = self.state.write().await;
        state
            .components
            .insert(name.to_string(), ComponentHealth::healthy());
    }

    /// Register every agent component
    pub async fn register_all(&self) {
        for name in components::ALL {
            self.register(name).await;
        }
    }

    /// Update component health status
    pub async fn update(&self, name: &str, health: ComponentHealth) {
        let mut state = self.state.write().await;
        state.components.insert(name.to_string(), health);
    }

    pub async fn set_healthy(&self, name: &str) {
        self.update(name, ComponentHealth::healthy()).await;
    }

    pub async fn set_degraded(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::degraded(message)).await;
    }

    pub async fn set_unhealthy(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::unhealthy(message)).await;
    }

    /// Mark startup as finished
    pub async fn set_started(&self, started: bool) {
        self.state.write().await.started = started;
    }

    /// Record that a full pass over all organizations finished
    pub async fn record_cycle_completed(&self) {
        self.state.write().await.last_cycle_timestamp = Some(chrono::Utc::now().timestamp());
    }

    /// Apply the aggregated component status of a finished pass and mark
    /// the cycle completed. Components the pass never touched keep their
    /// previous status.
    pub async fn record_pass(&self, pass: PassHealth) {
        let mut state = self.state.write().await;
        state.components.extend(pass.components);
        state.last_cycle_timestamp = Some(chrono::Utc::now().timestamp());
    }

    pub async fn health(&self) -> HealthResponse {
        let state = self.state.read().await;
        HealthResponse {
            status: HealthResponse::compute_status(&state.components),
            components: state.components.clone(),
            last_cycle_timestamp: state.last_cycle_timestamp,
        }
    }

    /// Ready once started, a cycle has completed and nothing is unhealthy
    pub async fn readiness(&self) -> ReadinessResponse {
        let health = self.health().await;
        let started = self.state.read().await.started;

        let reason = if !started {
            Some("Agent has not completed startup")
        } else if health.last_cycle_timestamp.is_none() {
            Some("No collection cycle completed yet")
        } else if health.status == ComponentStatus::Unhealthy {
            Some("Critical component unhealthy")
        } else {
            None
        };

        ReadinessResponse {
            ready: reason.is_none(),
            reason: reason.map(str::to_string),
        }
    }
}
