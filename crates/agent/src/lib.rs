//! Device health agent
//!
//! Wiring for the `device-health-agent` binary: environment configuration
//! and the health/metrics HTTP API.

pub mod api;
pub mod config;
