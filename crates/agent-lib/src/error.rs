//! Error types for the collection pipeline
//!
//! Errors are layered the same way the pipeline is:
//! - `FetchError`: the request never produced a response
//! - `ApiError`: a dashboard operation failed (transport, status or payload)
//! - `CollectError`: a cycle step failed and its family is aborted

use crate::collector::Family;
use thiserror::Error;

/// Boxed cause for transport failures
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Terminal failure of the bounded retry fetcher
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid request URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("GET {url} failed after {attempts} attempt(s): {source}")]
    Transport {
        url: String,
        attempts: u32,
        #[source]
        source: BoxError,
    },
}

/// Failure of a single dashboard API operation
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid dashboard base URL {url}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("{operation} failed: {source}")]
    Fetch {
        operation: &'static str,
        #[source]
        source: FetchError,
    },

    #[error("{operation} failed; [{status}] {body}")]
    UnexpectedStatus {
        operation: &'static str,
        status: u16,
        body: String,
    },

    #[error("{operation} returned a malformed body: {source}")]
    Decode {
        operation: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl ApiError {
    /// Name of the dashboard operation that failed, if any
    pub fn operation(&self) -> Option<&'static str> {
        match self {
            ApiError::InvalidBaseUrl { .. } => None,
            ApiError::Fetch { operation, .. }
            | ApiError::UnexpectedStatus { operation, .. }
            | ApiError::Decode { operation, .. } => Some(operation),
        }
    }

    /// HTTP status of the failing response, when one was received
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::UnexpectedStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Failure of a collection step for one organization
#[derive(Debug, Error)]
pub enum CollectError {
    /// Without an inventory nothing can be joined, so the whole cycle stops
    #[error("inventory fetch failed: {0}")]
    Inventory(#[source] ApiError),

    #[error("{family} collection failed: {source}")]
    Family {
        family: Family,
        #[source]
        source: ApiError,
    },
}

impl CollectError {
    pub fn family(family: Family, source: ApiError) -> Self {
        CollectError::Family { family, source }
    }

    /// The underlying API failure
    pub fn api_error(&self) -> &ApiError {
        match self {
            CollectError::Inventory(e) => e,
            CollectError::Family { source, .. } => source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_unexpected_status_message_carries_status_and_body() {
        let err = ApiError::UnexpectedStatus {
            operation: "GetNetworkNetworkHealthChannelUtilization",
            status: 400,
            body: "{\"errors\":[\"bad request\"]}".to_string(),
        };

        let message = err.to_string();
        assert!(message.contains("GetNetworkNetworkHealthChannelUtilization"));
        assert!(message.contains("[400]"));
        assert!(message.contains("bad request"));
        assert_eq!(err.status(), Some(400));
    }

    #[test]
    fn test_collect_error_wraps_cause() {
        let api = ApiError::Fetch {
            operation: "GetDeviceAppliancePerformance",
            source: FetchError::Transport {
                url: "https://api.example.com/api/v1/devices/Q2HP-XXXX/appliance/performance"
                    .to_string(),
                attempts: 5,
                source: "connection refused".into(),
            },
        };
        let err = CollectError::family(Family::PerformanceScore, api);

        assert!(err.to_string().starts_with("performance collection failed"));
        assert_eq!(
            err.api_error().operation(),
            Some("GetDeviceAppliancePerformance")
        );
        assert!(err.source().is_some());
    }
}
