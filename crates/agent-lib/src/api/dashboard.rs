//! Dashboard API endpoints used by the collectors

use super::models::{ChannelUtilizationRecord, Network, RawDevice, UplinkStatus};
use super::{Fetcher, HttpResponse};
use crate::error::ApiError;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

/// Page size requested from paginated list endpoints
pub const DEFAULT_PER_PAGE: u32 = 1000;

/// Largest page the channel utilization endpoint accepts
pub const CHANNEL_UTILIZATION_PER_PAGE: u32 = 100;

/// Upper bound on followed pages, guards against a server looping `rel=next`
const MAX_PAGES: usize = 1000;

/// Operation names used in errors and logs
pub mod operations {
    pub const ORGANIZATION_DEVICES: &str = "GetOrganizationDevices";
    pub const ORGANIZATION_NETWORKS: &str = "GetOrganizationNetworks";
    pub const APPLIANCE_UPLINK_STATUSES: &str = "GetOrganizationApplianceUplinkStatuses";
    pub const DEVICE_APPLIANCE_PERFORMANCE: &str = "GetDeviceAppliancePerformance";
    pub const NETWORK_CHANNEL_UTILIZATION: &str = "GetNetworkNetworkHealthChannelUtilization";
}

/// Typed access to the dashboard endpoints on top of a `Fetcher`
#[derive(Clone)]
pub struct DashboardApi {
    fetcher: Arc<dyn Fetcher>,
    base_url: Url,
    per_page: u32,
}

impl DashboardApi {
    /// Create an API handle rooted at `base_url` (e.g. "https://api.meraki.com")
    pub fn new(fetcher: Arc<dyn Fetcher>, base_url: &str) -> Result<Self, ApiError> {
        let base_url = Url::parse(base_url).map_err(|e| ApiError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;

        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidBaseUrl {
                url: base_url.to_string(),
                reason: "URL cannot be used as a base".to_string(),
            });
        }

        Ok(Self {
            fetcher,
            base_url,
            per_page: DEFAULT_PER_PAGE,
        })
    }

    /// Override the page size for list endpoints
    pub fn with_per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page.max(1);
        self
    }

    /// Build `<base>/api/v1/<segments...>`
    pub fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(["api", "v1"]).extend(segments);
        }
        url
    }

    fn paged_endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.endpoint(segments);
        url.query_pairs_mut()
            .append_pair("perPage", &self.per_page.to_string());
        url
    }

    /// GET a URL, returning the response whatever its status
    pub async fn get(&self, operation: &'static str, url: &str) -> Result<HttpResponse, ApiError> {
        self.fetcher
            .get(url)
            .await
            .map_err(|source| ApiError::Fetch { operation, source })
    }

    /// Decode a JSON body for an operation
    pub fn decode<T: DeserializeOwned>(operation: &'static str, body: &str) -> Result<T, ApiError> {
        serde_json::from_str(body).map_err(|source| ApiError::Decode { operation, source })
    }

    /// GET every page of a list endpoint, following `rel=next` links
    async fn get_all_pages<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        first: Url,
    ) -> Result<Vec<T>, ApiError> {
        let url = first.to_string();
        let response = self.get(operation, &url).await?;
        self.collect_pages(operation, url, response).await
    }

    /// Decode an already fetched first page and every page after it.
    /// Any non-2xx page fails the whole list.
    pub async fn collect_pages<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        url: String,
        response: HttpResponse,
    ) -> Result<Vec<T>, ApiError> {
        let mut items = Vec::new();
        let mut current = Some((url, response));
        let mut pages = 0usize;

        while let Some((url, response)) = current.take() {
            if !response.is_success() {
                return Err(ApiError::UnexpectedStatus {
                    operation,
                    status: response.status,
                    body: response.body,
                });
            }

            let page: Vec<T> = if response.body.trim().is_empty() {
                Vec::new()
            } else {
                Self::decode(operation, &response.body)?
            };
            items.extend(page);
            pages += 1;

            match response.next_page.filter(|n| *n != url) {
                Some(_) if pages >= MAX_PAGES => {
                    warn!(
                        operation = operation,
                        pages = pages,
                        "Stopping pagination at page limit"
                    );
                }
                Some(next) => {
                    let response = self.get(operation, &next).await?;
                    current = Some((next, response));
                }
                None => {}
            }
        }

        debug!(operation = operation, pages = pages, items = items.len(), "Fetched list");
        Ok(items)
    }

    /// Inventory of every device in an organization
    pub async fn organization_devices(&self, organization_id: &str) -> Result<Vec<RawDevice>, ApiError> {
        let url = self.paged_endpoint(&["organizations", organization_id, "devices"]);
        self.get_all_pages(operations::ORGANIZATION_DEVICES, url).await
    }

    /// Networks of an organization with their product types
    pub async fn organization_networks(&self, organization_id: &str) -> Result<Vec<Network>, ApiError> {
        let url = self.paged_endpoint(&["organizations", organization_id, "networks"]);
        self.get_all_pages(operations::ORGANIZATION_NETWORKS, url).await
    }

    /// Uplink and HA status of every appliance in an organization
    pub async fn organization_appliance_uplink_statuses(
        &self,
        organization_id: &str,
    ) -> Result<Vec<UplinkStatus>, ApiError> {
        let url = self.paged_endpoint(&[
            "organizations",
            organization_id,
            "appliance",
            "uplink",
            "statuses",
        ]);
        self.get_all_pages(operations::APPLIANCE_UPLINK_STATUSES, url)
            .await
    }

    /// Raw performance response for one appliance; the caller interprets the status
    pub async fn device_appliance_performance(&self, serial: &str) -> Result<HttpResponse, ApiError> {
        let url = self.endpoint(&["devices", serial, "appliance", "performance"]);
        self.get(operations::DEVICE_APPLIANCE_PERFORMANCE, url.as_str())
            .await
    }

    fn channel_utilization_url(&self, network_id: &str) -> Url {
        let mut url = self.endpoint(&["networks", network_id, "networkHealth", "channelUtilization"]);
        url.query_pairs_mut()
            .append_pair("perPage", &CHANNEL_UTILIZATION_PER_PAGE.to_string());
        url
    }

    /// Raw first page of channel utilization for one network; the caller
    /// interprets the status
    pub async fn network_channel_utilization(&self, network_id: &str) -> Result<HttpResponse, ApiError> {
        let url = self.channel_utilization_url(network_id);
        self.get(operations::NETWORK_CHANNEL_UTILIZATION, url.as_str())
            .await
    }

    /// Decode a successful first channel utilization page and fetch the rest
    pub async fn channel_utilization_pages(
        &self,
        network_id: &str,
        first: HttpResponse,
    ) -> Result<Vec<ChannelUtilizationRecord>, ApiError> {
        let url = self.channel_utilization_url(network_id).to_string();
        self.collect_pages(operations::NETWORK_CHANNEL_UTILIZATION, url, first)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serves canned responses keyed by exact URL
    struct CannedFetcher {
        responses: HashMap<String, HttpResponse>,
        requested: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Fetcher for CannedFetcher {
        async fn get(&self, url: &str) -> Result<HttpResponse, FetchError> {
            self.requested.lock().unwrap().push(url.to_string());
            self.responses
                .get(url)
                .cloned()
                .ok_or_else(|| FetchError::Transport {
                    url: url.to_string(),
                    attempts: 1,
                    source: "no canned response".into(),
                })
        }
    }

    fn api_with(responses: Vec<(&str, HttpResponse)>) -> (DashboardApi, Arc<CannedFetcher>) {
        let fetcher = Arc::new(CannedFetcher {
            responses: responses
                .into_iter()
                .map(|(url, resp)| (url.to_string(), resp))
                .collect(),
            requested: Mutex::new(Vec::new()),
        });
        let api = DashboardApi::new(fetcher.clone(), "https://api.example.com").unwrap();
        (api, fetcher)
    }

    #[test]
    fn test_endpoint_urls() {
        let (api, _) = api_with(vec![]);
        assert_eq!(
            api.endpoint(&["devices", "Q2HP-XXXX", "appliance", "performance"])
                .as_str(),
            "https://api.example.com/api/v1/devices/Q2HP-XXXX/appliance/performance"
        );
        assert_eq!(
            api.paged_endpoint(&["organizations", "123", "devices"]).as_str(),
            "https://api.example.com/api/v1/organizations/123/devices?perPage=1000"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let fetcher = Arc::new(CannedFetcher {
            responses: HashMap::new(),
            requested: Mutex::new(Vec::new()),
        });
        assert!(DashboardApi::new(fetcher.clone(), "not a url").is_err());
        assert!(DashboardApi::new(fetcher, "mailto:ops@example.com").is_err());
    }

    #[tokio::test]
    async fn test_pagination_follows_next_links() {
        let first = "https://api.example.com/api/v1/organizations/1/networks?perPage=1000";
        let second = "https://api.example.com/api/v1/organizations/1/networks?perPage=1000&startingAfter=N_1";
        let (api, fetcher) = api_with(vec![
            (
                first,
                HttpResponse::new(200, r#"[{"id":"N_1","productTypes":["wireless"]}]"#)
                    .with_next_page(second),
            ),
            (
                second,
                HttpResponse::new(200, r#"[{"id":"N_2","productTypes":["appliance"]}]"#),
            ),
        ]);

        let networks = api.organization_networks("1").await.unwrap();

        assert_eq!(networks.len(), 2);
        assert_eq!(networks[0].id, "N_1");
        assert_eq!(networks[1].id, "N_2");
        assert_eq!(fetcher.requested.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_list_endpoint_rejects_error_status() {
        let url = "https://api.example.com/api/v1/organizations/1/devices?perPage=1000";
        let (api, _) = api_with(vec![(url, HttpResponse::new(404, "{\"errors\":[\"Not found\"]}"))]);

        let err = api.organization_devices("1").await.unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.operation(), Some(operations::ORGANIZATION_DEVICES));
    }

    #[tokio::test]
    async fn test_list_endpoint_rejects_malformed_body() {
        let url = "https://api.example.com/api/v1/organizations/1/appliance/uplink/statuses?perPage=1000";
        let (api, _) = api_with(vec![(url, HttpResponse::new(200, "<html>oops</html>"))]);

        let err = api.organization_appliance_uplink_statuses("1").await.unwrap_err();
        assert!(matches!(err, ApiError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_channel_utilization_follows_next_links() {
        let first = "https://api.example.com/api/v1/networks/N_1/networkHealth/channelUtilization?perPage=100";
        let second = "https://api.example.com/api/v1/networks/N_1/networkHealth/channelUtilization?perPage=100&startingAfter=Q2AB-0001";
        let (api, fetcher) = api_with(vec![
            (
                first,
                HttpResponse::new(200, r#"[{"serial":"Q2AB-0001","wifi0":[]}]"#)
                    .with_next_page(second),
            ),
            (
                second,
                HttpResponse::new(200, r#"[{"serial":"Q2AB-0002","wifi0":[]}]"#),
            ),
        ]);

        let response = api.network_channel_utilization("N_1").await.unwrap();
        let records = api.channel_utilization_pages("N_1", response).await.unwrap();

        let serials: Vec<&str> = records.iter().map(|r| r.serial.as_str()).collect();
        assert_eq!(serials, vec!["Q2AB-0001", "Q2AB-0002"]);
        assert_eq!(fetcher.requested.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_later_channel_page_fails_list() {
        let first = "https://api.example.com/api/v1/networks/N_1/networkHealth/channelUtilization?perPage=100";
        let second = "https://api.example.com/api/v1/networks/N_1/networkHealth/channelUtilization?perPage=100&startingAfter=Q2AB-0001";
        let (api, _) = api_with(vec![
            (
                first,
                HttpResponse::new(200, r#"[{"serial":"Q2AB-0001"}]"#).with_next_page(second),
            ),
            (second, HttpResponse::new(500, "Internal error")),
        ]);

        let response = api.network_channel_utilization("N_1").await.unwrap();
        let err = api.channel_utilization_pages("N_1", response).await.unwrap_err();
        assert_eq!(err.status(), Some(500));
    }

    #[tokio::test]
    async fn test_raw_endpoints_return_any_status() {
        let url = "https://api.example.com/api/v1/networks/N_1/networkHealth/channelUtilization?perPage=100";
        let (api, _) = api_with(vec![(url, HttpResponse::new(400, "MR 27.0"))]);

        let response = api.network_channel_utilization("N_1").await.unwrap();
        assert_eq!(response.status, 400);
    }

    #[tokio::test]
    async fn test_fetch_error_names_operation() {
        let (api, _) = api_with(vec![]);
        let err = api.device_appliance_performance("Q2HP-XXXX").await.unwrap_err();
        assert_eq!(err.operation(), Some(operations::DEVICE_APPLIANCE_PERFORMANCE));
    }
}
