//! HTTP client for the dashboard API with bounded retries
//!
//! This module provides a reqwest-based `Fetcher` that:
//! - Authenticates with the dashboard API key
//! - Retries rate-limited (429) and server-error (5xx) responses
//! - Honors `Retry-After` and otherwise backs off exponentially
//! - Gives up after a configured number of attempts

use super::{parse_next_link, Fetcher, HttpResponse};
use crate::error::FetchError;
use crate::observability::AgentMetrics;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, LINK, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for the retrying client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Dashboard API key, sent as a bearer token
    pub api_key: String,
    /// Maximum number of attempts per request, including the first
    pub max_attempts: u32,
    /// Timeout for a single attempt
    pub request_timeout: Duration,
    /// Backoff before the first retry when the server gives no `Retry-After`
    pub initial_backoff: Duration,
    /// Upper bound for any wait between attempts
    pub max_backoff: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            max_attempts: 5,
            request_timeout: Duration::from_secs(30),
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
        }
    }
}

/// Dashboard API client implementing `Fetcher`
pub struct RetryingClient {
    http: Client,
    config: ClientConfig,
    metrics: AgentMetrics,
}

impl RetryingClient {
    /// Create a new client with the given configuration
    pub fn new(config: ClientConfig) -> Result<Self, FetchError> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("device-health-agent/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Transport {
                url: String::new(),
                attempts: 0,
                source: Box::new(e),
            })?;

        Ok(Self {
            http,
            config,
            metrics: AgentMetrics::new(),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Perform one attempt, returning the response and any `Retry-After` hint
    async fn send_once(
        &self,
        url: &str,
    ) -> Result<(HttpResponse, Option<Duration>), reqwest::Error> {
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.config.api_key)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        let headers = response.headers();
        let next_page = headers
            .get(LINK)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_next_link);
        let retry_after = headers
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);

        let body = response.text().await?;

        Ok((
            HttpResponse {
                status: status.as_u16(),
                body,
                next_page,
            },
            retry_after,
        ))
    }
}

/// Whether a status is worth another attempt
fn is_retryable(status: u16) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS.as_u16() || (500..600).contains(&status)
}

#[async_trait]
impl Fetcher for RetryingClient {
    async fn get(&self, url: &str) -> Result<HttpResponse, FetchError> {
        reqwest::Url::parse(url).map_err(|e| FetchError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let max_attempts = self.config.max_attempts.max(1);
        let mut backoff = self.config.initial_backoff;
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            let wait = match self.send_once(url).await {
                Ok((response, retry_after)) => {
                    if !is_retryable(response.status) || attempt >= max_attempts {
                        debug!(
                            url = %url,
                            status = response.status,
                            attempts = attempt,
                            "Dashboard request finished"
                        );
                        return Ok(response);
                    }

                    warn!(
                        url = %url,
                        status = response.status,
                        attempt = attempt,
                        max_attempts = max_attempts,
                        "Dashboard request throttled or failed, retrying"
                    );
                    retry_after.unwrap_or(backoff)
                }
                Err(e) => {
                    if attempt >= max_attempts {
                        return Err(FetchError::Transport {
                            url: url.to_string(),
                            attempts: attempt,
                            source: Box::new(e),
                        });
                    }

                    warn!(
                        url = %url,
                        error = %e,
                        attempt = attempt,
                        max_attempts = max_attempts,
                        "Dashboard request could not be sent, retrying"
                    );
                    backoff
                }
            };

            self.metrics.inc_http_retries();
            tokio::time::sleep(wait.min(self.config.max_backoff)).await;
            backoff = std::cmp::min(backoff * 2, self.config.max_backoff);
        }
    }
}

/// Builder for RetryingClient configuration
pub struct RetryingClientBuilder {
    config: ClientConfig,
}

impl RetryingClientBuilder {
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
        }
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = key.into();
        self
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    pub fn initial_backoff(mut self, backoff: Duration) -> Self {
        self.config.initial_backoff = backoff;
        self
    }

    pub fn max_backoff(mut self, backoff: Duration) -> Self {
        self.config.max_backoff = backoff;
        self
    }

    pub fn build(self) -> anyhow::Result<RetryingClient> {
        if self.config.api_key.is_empty() {
            anyhow::bail!("api_key is required");
        }
        Ok(RetryingClient::new(self.config)?)
    }
}

impl Default for RetryingClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
