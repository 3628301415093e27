use crate::metrics::{ApiMetrics, MetricsCollector, RequestMetrics};
use crate::types::{
    ChannelListResponse, PlaylistItemListResponse, SearchListResponse, VideoListResponse,
    VideoPart,
};
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tubescout_core::{is_quota_failure, CoreError, YouTubeApiError, QUOTA_MARKER};

pub const YOUTUBE_API_BASE: &str = "https://www.googleapis.com/youtube/v3";

/// Largest `maxResults` and id batch the Data API accepts.
pub const MAX_PAGE_SIZE: u32 = 50;

/// Parameters of one `search.list` page.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub query: String,
    pub published_after: DateTime<Utc>,
    pub region_code: String,
    pub page_size: u32,
    pub page_token: Option<String>,
}

impl SearchRequest {
    pub fn query_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("part", "snippet".to_string()),
            ("type", "video".to_string()),
            ("maxResults", self.page_size.min(MAX_PAGE_SIZE).to_string()),
            ("order", "date".to_string()),
            (
                "publishedAfter",
                self.published_after
                    .to_rfc3339_opts(SecondsFormat::Secs, true),
            ),
            ("regionCode", self.region_code.clone()),
            ("q", self.query.clone()),
        ];
        if let Some(token) = &self.page_token {
            params.push(("pageToken", token.clone()));
        }
        params
    }
}

/// The structured-data calls the pipeline makes. Every method reports quota
/// exhaustion as [`YouTubeApiError::QuotaExceeded`].
pub trait YouTubeApi {
    async fn search(&self, request: &SearchRequest) -> Result<SearchListResponse, CoreError>;

    async fn channel_statistics(&self, channel_id: &str)
        -> Result<ChannelListResponse, CoreError>;

    /// Snippet, statistics, content details and topic details in one call.
    async fn channel_full(&self, channel_id: &str) -> Result<ChannelListResponse, CoreError>;

    async fn playlist_items(
        &self,
        playlist_id: &str,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<PlaylistItemListResponse, CoreError>;

    async fn video_details(
        &self,
        ids: &[String],
        part: VideoPart,
    ) -> Result<VideoListResponse, CoreError>;
}

#[derive(Debug, Clone)]
pub struct YouTubeApiClient {
    http_client: Client,
    api_key: String,
    base_url: String,
    metrics: MetricsCollector,
}

impl YouTubeApiClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, CoreError> {
        let http_client = Client::builder()
            .user_agent(concat!("tubescout/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http_client,
            api_key: api_key.into(),
            base_url: YOUTUBE_API_BASE.to_string(),
            metrics: MetricsCollector::new(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub async fn make_request<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query_params: &[(&str, String)],
    ) -> Result<T, CoreError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let start_time = Instant::now();

        debug!("Making YouTube API request: GET {}", endpoint);
        let outcome = self
            .http_client
            .get(&url)
            .query(query_params)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await;

        let response = match outcome {
            Ok(response) => response,
            Err(e) => {
                error!("Network error for GET {}: {}", endpoint, e);
                self.record(endpoint, None, start_time, false, Some("network_error"))
                    .await;
                return Err(map_transport_error(e));
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let api_error = map_status_error(status.as_u16(), &body, endpoint);
            let error_type = match &api_error {
                YouTubeApiError::QuotaExceeded { .. } => "quota_exceeded",
                YouTubeApiError::ServerError { .. } => "server_error",
                YouTubeApiError::NotFound { .. } => "not_found",
                _ => "rejected",
            };
            self.record(endpoint, Some(status.as_u16()), start_time, false, Some(error_type))
                .await;

            if matches!(api_error, YouTubeApiError::QuotaExceeded { .. }) {
                warn!("YouTube API quota exhausted on {}: {}", endpoint, api_error);
            } else {
                error!(
                    "Request failed with status: {} for {}",
                    status.as_u16(),
                    endpoint
                );
            }
            return Err(CoreError::YouTubeApi(api_error));
        }

        let parsed = response.json::<T>().await.map_err(|e| {
            error!("Failed to parse {} response: {}", endpoint, e);
            CoreError::YouTubeApi(YouTubeApiError::InvalidResponse {
                details: format!("Failed to parse {} response", endpoint),
            })
        });
        self.record(
            endpoint,
            Some(status.as_u16()),
            start_time,
            parsed.is_ok(),
            parsed.is_err().then_some("invalid_response"),
        )
        .await;
        parsed
    }

    async fn record(
        &self,
        endpoint: &str,
        status_code: Option<u16>,
        start_time: Instant,
        success: bool,
        error_type: Option<&str>,
    ) {
        self.metrics
            .record_request(RequestMetrics {
                endpoint: endpoint.to_string(),
                status_code,
                response_time: start_time.elapsed(),
                success,
                quota_exceeded: error_type == Some("quota_exceeded"),
                error_type: error_type.map(str::to_string),
            })
            .await;
    }

    pub async fn get_metrics(&self) -> ApiMetrics {
        self.metrics.get_metrics().await
    }

    pub async fn reset_metrics(&self) {
        self.metrics.reset_metrics().await;
    }
}

impl YouTubeApi for YouTubeApiClient {
    async fn search(&self, request: &SearchRequest) -> Result<SearchListResponse, CoreError> {
        let page: SearchListResponse = self
            .make_request("search", &request.query_params())
            .await?;
        info!(
            "Search '{}' returned {} items (next page: {})",
            request.query,
            page.items.len(),
            page.next_page_token.is_some()
        );
        Ok(page)
    }

    async fn channel_statistics(
        &self,
        channel_id: &str,
    ) -> Result<ChannelListResponse, CoreError> {
        let params = [
            ("part", "statistics".to_string()),
            ("id", channel_id.to_string()),
        ];
        self.make_request("channels", &params).await
    }

    async fn channel_full(&self, channel_id: &str) -> Result<ChannelListResponse, CoreError> {
        let params = [
            (
                "part",
                "snippet,brandingSettings,topicDetails,contentDetails,statistics".to_string(),
            ),
            ("id", channel_id.to_string()),
        ];
        let response: ChannelListResponse = self.make_request("channels", &params).await?;
        debug!("Retrieved channel {} ({} items)", channel_id, response.items.len());
        Ok(response)
    }

    async fn playlist_items(
        &self,
        playlist_id: &str,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<PlaylistItemListResponse, CoreError> {
        let mut params = vec![
            ("part", "contentDetails".to_string()),
            ("playlistId", playlist_id.to_string()),
            ("maxResults", page_size.min(MAX_PAGE_SIZE).to_string()),
        ];
        if let Some(token) = page_token {
            params.push(("pageToken", token.to_string()));
        }
        self.make_request("playlistItems", &params).await
    }

    async fn video_details(
        &self,
        ids: &[String],
        part: VideoPart,
    ) -> Result<VideoListResponse, CoreError> {
        if ids.len() > MAX_PAGE_SIZE as usize {
            return Err(CoreError::InvalidInput {
                message: format!(
                    "videos.list accepts at most {} ids, got {}",
                    MAX_PAGE_SIZE,
                    ids.len()
                ),
            });
        }
        let params = [("part", part.as_str().to_string()), ("id", ids.join(","))];
        self.make_request("videos", &params).await
    }
}

fn map_transport_error(error: reqwest::Error) -> CoreError {
    if error.is_timeout() {
        CoreError::YouTubeApi(YouTubeApiError::RequestTimeout)
    } else if error.is_connect() {
        CoreError::YouTubeApi(YouTubeApiError::ConnectionFailed {
            reason: error.to_string(),
        })
    } else {
        CoreError::Network(error)
    }
}

/// Turn a non-success response into a typed API error. Quota exhaustion wins
/// over every other interpretation.
pub fn map_status_error(status: u16, body: &str, endpoint: &str) -> YouTubeApiError {
    if is_quota_failure(status, body) {
        return YouTubeApiError::QuotaExceeded {
            status,
            reason: error_reason(body).unwrap_or_else(|| {
                if body.contains(QUOTA_MARKER) {
                    QUOTA_MARKER.to_string()
                } else {
                    format!("HTTP {}", status)
                }
            }),
        };
    }
    match status {
        404 => YouTubeApiError::NotFound {
            resource: endpoint.to_string(),
        },
        500..=599 => YouTubeApiError::ServerError {
            status_code: status,
        },
        _ => YouTubeApiError::Rejected {
            status,
            message: error_message(body).unwrap_or_else(|| body.chars().take(200).collect()),
        },
    }
}

fn error_payload(body: &str) -> Option<serde_json::Value> {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| value.get("error").cloned())
}

fn error_reason(body: &str) -> Option<String> {
    error_payload(body)?
        .get("errors")?
        .get(0)?
        .get("reason")?
        .as_str()
        .map(str::to_string)
}

fn error_message(body: &str) -> Option<String> {
    error_payload(body)?
        .get("message")?
        .as_str()
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const QUOTA_BODY: &str = r#"{"error":{"code":403,"message":"The request cannot be completed because you have exceeded your quota.","errors":[{"message":"quota","domain":"youtube.quota","reason":"quotaExceeded"}]}}"#;

    #[test]
    fn test_search_query_params() {
        let request = SearchRequest {
            query: "recette".to_string(),
            published_after: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
            region_code: "FR".to_string(),
            page_size: 80,
            page_token: Some("CDIQAA".to_string()),
        };
        let params = request.query_params();
        let get = |name: &str| {
            params
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| value.as_str())
        };

        assert_eq!(get("type"), Some("video"));
        assert_eq!(get("order"), Some("date"));
        assert_eq!(get("maxResults"), Some("50"));
        assert_eq!(get("publishedAfter"), Some("2024-01-02T03:04:05Z"));
        assert_eq!(get("regionCode"), Some("FR"));
        assert_eq!(get("pageToken"), Some("CDIQAA"));
    }

    #[test]
    fn test_map_status_error_quota() {
        let error = map_status_error(403, QUOTA_BODY, "search");
        assert!(matches!(
            error,
            YouTubeApiError::QuotaExceeded { status: 403, ref reason } if reason == "quotaExceeded"
        ));

        let error = map_status_error(429, "", "videos");
        assert!(matches!(error, YouTubeApiError::QuotaExceeded { status: 429, .. }));

        let error = map_status_error(400, "... quotaExceeded ...", "videos");
        assert!(matches!(error, YouTubeApiError::QuotaExceeded { status: 400, .. }));
    }

    #[test]
    fn test_map_status_error_other() {
        assert!(matches!(
            map_status_error(503, "", "channels"),
            YouTubeApiError::ServerError { status_code: 503 }
        ));
        assert!(matches!(
            map_status_error(404, "", "playlistItems"),
            YouTubeApiError::NotFound { .. }
        ));

        let body = r#"{"error":{"code":400,"message":"Invalid page token"}}"#;
        match map_status_error(400, body, "search") {
            YouTubeApiError::Rejected { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "Invalid page token");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_too_many_ids_rejected_locally() {
        let client = YouTubeApiClient::new("key").unwrap();
        let ids: Vec<String> = (0..51).map(|i| format!("v{}", i)).collect();
        let result = tokio_test::block_on(client.video_details(&ids, VideoPart::Statistics));
        assert!(matches!(result, Err(CoreError::InvalidInput { .. })));
        assert_eq!(tokio_test::block_on(client.get_metrics()).total_requests, 0);
    }
}
