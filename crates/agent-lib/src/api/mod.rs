//! Access to the dashboard API
//!
//! This module provides:
//! - The `Fetcher` seam: a bounded-retry HTTP GET
//! - `RetryingClient`, the reqwest implementation with rate-limit handling
//! - `DashboardApi`, endpoint URLs, pagination and response decoding

mod client;
mod dashboard;
pub mod models;

pub use client::{ClientConfig, RetryingClient, RetryingClientBuilder};
pub use dashboard::{operations, DashboardApi, CHANNEL_UTILIZATION_PER_PAGE, DEFAULT_PER_PAGE};

use crate::error::FetchError;
use async_trait::async_trait;

/// HTTP 204 No Content
pub const STATUS_NO_CONTENT: u16 = 204;

/// Final response of a GET after the fetcher stopped retrying
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
    /// Target of the `Link: <...>; rel=next` header, if any
    pub next_page: Option<String>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            next_page: None,
        }
    }

    pub fn with_next_page(mut self, url: impl Into<String>) -> Self {
        self.next_page = Some(url.into());
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_no_content(&self) -> bool {
        self.status == STATUS_NO_CONTENT
    }
}

/// Bounded-retry HTTP GET against the dashboard API
///
/// Implementations retry rate-limited and transient failures internally and
/// return the last response received, whatever its status. An error means no
/// response could be obtained at all.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn get(&self, url: &str) -> Result<HttpResponse, FetchError>;
}

/// Extract the `rel=next` target from a `Link` header value
pub fn parse_next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|part| {
        let mut pieces = part.split(';');
        let target = pieces.next()?.trim();
        let is_next = pieces.any(|param| {
            let param = param.trim().replace(' ', "");
            param == "rel=next" || param == "rel=\"next\""
        });
        if is_next && target.starts_with('<') && target.ends_with('>') {
            Some(target[1..target.len() - 1].to_string())
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_classification() {
        assert!(HttpResponse::new(200, "[]").is_success());
        assert!(HttpResponse::new(204, "").is_success());
        assert!(HttpResponse::new(204, "").is_no_content());
        assert!(!HttpResponse::new(400, "").is_success());
        assert!(!HttpResponse::new(200, "{}").is_no_content());
    }

    #[test]
    fn test_parse_next_link() {
        let header = "<https://api.meraki.com/api/v1/organizations/1/devices?perPage=2&startingAfter=0>; rel=first, \
                      <https://api.meraki.com/api/v1/organizations/1/devices?perPage=2&startingAfter=Q2HP>; rel=next";
        assert_eq!(
            parse_next_link(header).as_deref(),
            Some("https://api.meraki.com/api/v1/organizations/1/devices?perPage=2&startingAfter=Q2HP")
        );
    }

    #[test]
    fn test_parse_next_link_quoted_rel() {
        let header = "<https://example.com/page2>; rel=\"next\"";
        assert_eq!(
            parse_next_link(header).as_deref(),
            Some("https://example.com/page2")
        );
    }

    #[test]
    fn test_parse_next_link_absent() {
        assert_eq!(parse_next_link("<https://example.com/first>; rel=first"), None);
        assert_eq!(parse_next_link(""), None);
    }
}
